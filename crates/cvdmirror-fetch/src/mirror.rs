//! Run-scoped mirror selection.

use tracing::{info, warn};

use crate::Result;
use crate::artifact::{ArtifactDescriptor, DbType};
use crate::error::FetchError;
use crate::http::HttpClient;

/// Probe candidate bases in order and fix the first reachable one for
/// the run.
///
/// The probe fetches the bytecode full artifact's status line with the
/// client's short probe timeout. Any network error or non-success
/// status moves on to the next candidate. No candidate reachable is
/// fatal for the run; the next scheduled invocation is the retry.
pub async fn select_mirror<C: HttpClient>(client: &C, candidates: &[String]) -> Result<String> {
    for base in candidates {
        let base = base.trim_end_matches('/');
        let probe = ArtifactDescriptor::full(base, DbType::Bytecode);
        match client.probe(&probe.url).await {
            Ok(()) => {
                info!(mirror = %base, "selected mirror");
                return Ok(base.to_string());
            }
            Err(err) => {
                warn!(mirror = %base, error = %err, kind = err.kind(), "mirror probe failed");
            }
        }
    }
    Err(FetchError::NoMirror { count: candidates.len() })
}
