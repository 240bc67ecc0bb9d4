//! Asynchronous HTTP client abstraction.

use std::future::Future;
use std::time::Duration;

use crate::Result;
use crate::error::FetchError;

/// Identifying client header sent with every request.
pub const USER_AGENT: &str = concat!("cvdmirror/", env!("CARGO_PKG_VERSION"));

/// Request timeouts for one run.
///
/// The probe timeout is short so an unreachable mirror fails fast; the
/// transfer timeout is generous because full definition files run to
/// several megabytes.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub probe: Duration,
    pub transfer: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { probe: Duration::from_secs(5), transfer: Duration::from_secs(60) }
    }
}

/// Minimal client interface the pipeline needs.
///
/// [`MirrorClient`] is the production implementation; tests substitute
/// mocks.
pub trait HttpClient: Send + Sync {
    /// GET `url` and return the full response body.
    ///
    /// A non-success status is an error, not a short body.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Bounded reachability check: issue the request, check the status
    /// line, discard the body.
    fn probe(&self, url: &str) -> impl Future<Output = Result<()>> + Send;
}

/// reqwest-backed client with per-purpose timeouts and the identifying
/// `User-Agent`.
pub struct MirrorClient {
    transfer: reqwest::Client,
    probe: reqwest::Client,
}

impl MirrorClient {
    pub fn new(timeouts: Timeouts) -> Result<Self> {
        let transfer = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeouts.transfer)
            .build()?;
        let probe = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeouts.probe)
            .build()?;
        Ok(Self { transfer, probe })
    }
}

impl HttpClient for MirrorClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.transfer.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { status, url: url.to_string() });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn probe(&self, url: &str) -> Result<()> {
        let resp = self.probe.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { status, url: url.to_string() });
        }
        Ok(())
    }
}
