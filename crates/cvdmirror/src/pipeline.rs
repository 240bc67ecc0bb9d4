//! One synchronization run: mirror selection, concurrent
//! fetch-parse-validate-admit tasks, and single-hop incremental
//! chaining.
//!
//! Tasks join through one dynamically growing [`JoinSet`]: each full
//! artifact that parses with a version hands back a chained descriptor,
//! which the join loop spawns into the same set. Chaining rides on the
//! parse alone and runs in parallel with validation and admission, so a
//! full artifact that fails its checksum still has its patch mirrored.
//! Per-artifact failures are logged and recorded; only mirror selection
//! failing (or a task panicking) aborts the run.

use std::sync::Arc;

use cvdmirror_cvd::{CvdFile, validate};
use cvdmirror_fetch::{
    ArtifactDescriptor, ArtifactKind, DbType, FetchError, HttpClient, select_mirror,
};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, DefinitionCache};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Format(#[from] cvdmirror_cvd::CvdError),

    #[error("checksum mismatch for {filename}: header claims {claimed}, body digests to {computed}")]
    ChecksumMismatch { filename: String, claimed: String, computed: String },

    #[error("{count} header problem(s), admission refused for {filename}")]
    RejectedHeader { filename: String, count: usize },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("sync task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Options for one run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Follow each admitted full artifact with its incremental patch.
    pub follow_diffs: bool,
    /// Header field problems block admission.
    pub strict_headers: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { follow_diffs: true, strict_headers: true }
    }
}

/// What one run accomplished. Per-artifact failures live here, not in
/// the run's error.
#[derive(Debug, Default)]
pub struct RunReport {
    pub mirror: String,
    pub admitted: Vec<String>,
    pub failed: Vec<(String, String)>,
}

struct TaskOutcome {
    db_type: DbType,
    filename: String,
    /// Derived from the parse alone; present even when admission
    /// failed.
    chained: Option<ArtifactDescriptor>,
    result: Result<(), PipelineError>,
}

pub struct Pipeline<C: HttpClient> {
    client: Arc<C>,
    cache: DefinitionCache,
    options: SyncOptions,
}

impl<C: HttpClient + 'static> Pipeline<C> {
    pub fn new(client: Arc<C>, cache: DefinitionCache, options: SyncOptions) -> Self {
        Self { client, cache, options }
    }

    /// Drive one run to completion.
    ///
    /// Selection happens once; every artifact URL in the run uses the
    /// selected base. The run is complete when the task set, including
    /// dynamically spawned children, drains.
    pub async fn run(&self, mirrors: &[String]) -> Result<RunReport, PipelineError> {
        let base = select_mirror(self.client.as_ref(), mirrors).await?;

        let mut tasks = JoinSet::new();
        for db_type in DbType::ALL {
            self.spawn(&mut tasks, &base, ArtifactDescriptor::full(&base, db_type), 0);
        }

        let mut report = RunReport { mirror: base.clone(), ..RunReport::default() };
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined?;
            if let Some(child) = outcome.chained {
                self.spawn(&mut tasks, &base, child, 1);
            }
            match outcome.result {
                Ok(()) => report.admitted.push(outcome.filename),
                Err(err) => {
                    warn!(
                        artifact = %outcome.db_type,
                        filename = %outcome.filename,
                        error = %err,
                        "artifact failed, run continues"
                    );
                    report.failed.push((outcome.filename, err.to_string()));
                }
            }
        }

        info!(
            mirror = %report.mirror,
            admitted = report.admitted.len(),
            failed = report.failed.len(),
            "definition sync complete"
        );
        Ok(report)
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<TaskOutcome>,
        base: &str,
        desc: ArtifactDescriptor,
        depth: u8,
    ) {
        let client = self.client.clone();
        let cache = self.cache.clone();
        let options = self.options;
        let base = base.to_string();
        tasks.spawn(async move {
            let db_type = desc.db_type;
            let filename = desc.filename().to_string();
            let (chained, result) = sync_artifact(client, cache, options, base, desc, depth).await;
            TaskOutcome { db_type, filename, chained, result }
        });
    }
}

/// Fetch one artifact, derive its chained patch, and decide admission.
///
/// The chained descriptor comes from the parsed version alone, so a
/// full artifact refused admission still has its patch mirrored.
/// Incremental patches carry no CVD framing and are cached verbatim.
async fn sync_artifact<C: HttpClient>(
    client: Arc<C>,
    cache: DefinitionCache,
    options: SyncOptions,
    base: String,
    desc: ArtifactDescriptor,
    depth: u8,
) -> (Option<ArtifactDescriptor>, Result<(), PipelineError>) {
    let filename = desc.filename().to_string();
    info!(artifact = %desc.db_type, filename = %filename, url = %desc.url, "fetching definition");
    let bytes = match client.fetch(&desc.url).await {
        Ok(bytes) => bytes,
        Err(err) => return (None, Err(err.into())),
    };

    if desc.kind == ArtifactKind::Incremental {
        let result = cache.insert(&filename, bytes).map_err(PipelineError::from);
        if result.is_ok() {
            info!(artifact = %desc.db_type, filename = %filename, "added to cache");
        }
        return (None, result);
    }

    let file = match CvdFile::parse(&bytes) {
        Ok(file) => file,
        Err(err) => return (None, Err(err.into())),
    };

    // exactly one incremental hop per full artifact per run; version 0
    // means the header never yielded one
    let chained = (options.follow_diffs && depth == 0 && file.header.version > 0)
        .then(|| ArtifactDescriptor::incremental(&base, desc.db_type, file.header.version));

    let result = admit(&cache, options, desc.db_type, filename, &file, bytes);
    (chained, result)
}

/// Binding checks for a parsed full artifact: the checksum always, the
/// digital signature advisory only, and header problems under strict
/// options.
fn admit(
    cache: &DefinitionCache,
    options: SyncOptions,
    db_type: DbType,
    filename: String,
    file: &CvdFile,
    bytes: Vec<u8>,
) -> Result<(), PipelineError> {
    let report = validate(&file.header, &file.body);
    if !report.md5_valid {
        return Err(PipelineError::ChecksumMismatch {
            filename,
            claimed: file.header.md5_hex.clone(),
            computed: report.md5_computed,
        });
    }
    if report.dsig_valid {
        debug!(artifact = %db_type, filename = %filename, "digital signature verified");
    } else {
        // advisory: the scheme is a reconstruction, never a gate
        warn!(
            artifact = %db_type,
            filename = %filename,
            decoded = %report.dsig_decoded,
            "digital signature mismatch"
        );
    }
    if !file.header.problems.is_empty() {
        for problem in &file.header.problems {
            warn!(artifact = %db_type, filename = %filename, problem = %problem, "header field problem");
        }
        if options.strict_headers {
            return Err(PipelineError::RejectedHeader {
                filename,
                count: file.header.problems.len(),
            });
        }
    }

    cache.insert(&filename, bytes)?;
    info!(artifact = %db_type, filename = %filename, version = file.header.version, "added to cache");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use cvdmirror_fetch::{Result as FetchResult, StatusCode};

    use super::*;

    /// In-memory mirror: URL to body, with a request log.
    struct MapClient {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MapClient {
        fn new(bodies: HashMap<String, Vec<u8>>) -> Arc<Self> {
            Arc::new(Self { bodies, requests: Mutex::new(Vec::new()) })
        }

        fn requested(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl HttpClient for MapClient {
        async fn fetch(&self, url: &str) -> FetchResult<Vec<u8>> {
            self.requests.lock().unwrap().push(url.to_string());
            self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
                status: StatusCode::NOT_FOUND,
                url: url.to_string(),
            })
        }

        async fn probe(&self, url: &str) -> FetchResult<()> {
            if self.bodies.contains_key(url) {
                Ok(())
            } else {
                Err(FetchError::Status {
                    status: StatusCode::NOT_FOUND,
                    url: url.to_string(),
                })
            }
        }
    }

    fn cvd_bytes(fields_after_magic: &str, body: &[u8]) -> Vec<u8> {
        let mut raw = format!("ClamAV-VDB:{fields_after_magic}").into_bytes();
        raw.resize(cvdmirror_cvd::HEADER_LEN, b' ');
        raw.extend_from_slice(body);
        raw
    }

    /// Well-formed full artifact with a real body digest.
    fn valid_cvd(version: u32, body: &[u8]) -> Vec<u8> {
        let digest = format!("{:x}", md5::compute(body));
        cvd_bytes(
            &format!("07 Mar 2017 08-02 -0500:{version}:1741572:63:{digest}:QC2Zn:neo:1488891746"),
            body,
        )
    }

    fn mirror(entries: &[(&str, Vec<u8>)]) -> HashMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(path, body)| (format!("http://m/{path}"), body.clone()))
            .collect()
    }

    fn full_mirror() -> HashMap<String, Vec<u8>> {
        mirror(&[
            ("main.cvd", valid_cvd(100, b"main body")),
            ("bytecode.cvd", valid_cvd(200, b"bytecode body")),
            ("daily.cvd", valid_cvd(300, b"daily body")),
            ("main-100.cdiff", b"main patch".to_vec()),
            ("bytecode-200.cdiff", b"bytecode patch".to_vec()),
            ("daily-300.cdiff", b"daily patch".to_vec()),
        ])
    }

    fn cache() -> DefinitionCache {
        DefinitionCache::new(1024 * 1024, Duration::from_secs(60), 1024)
    }

    fn mirrors(bases: &[&str]) -> Vec<String> {
        bases.iter().map(|b| b.to_string()).collect()
    }

    #[tokio::test]
    async fn run_admits_all_types_and_chains_one_hop() {
        let client = MapClient::new(full_mirror());
        let cache = cache();
        let pipeline = Pipeline::new(client, cache.clone(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert_eq!(report.admitted.len(), 6);
        for key in
            ["main.cvd", "bytecode.cvd", "daily.cvd", "main-100.cdiff", "daily-300.cdiff"]
        {
            assert!(cache.get(key).is_some(), "missing {key}");
        }
        assert_eq!(cache.get("daily-300.cdiff").unwrap().as_ref(), b"daily patch");
    }

    #[tokio::test]
    async fn follow_diffs_off_stops_at_full_artifacts() {
        let client = MapClient::new(full_mirror());
        let cache = cache();
        let options = SyncOptions { follow_diffs: false, ..SyncOptions::default() };
        let pipeline = Pipeline::new(client.clone(), cache.clone(), options);

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert_eq!(report.admitted.len(), 3);
        assert!(cache.get("daily-300.cdiff").is_none());
        assert!(!client.requested().contains(&"http://m/daily-300.cdiff".to_string()));
    }

    #[tokio::test]
    async fn checksum_mismatch_blocks_admission_but_not_chaining() {
        let mut bodies = full_mirror();
        let forged = cvd_bytes(
            "07 Mar 2017 08-02 -0500:300:1741572:63:00000000000000000000000000000000:QC2Zn:neo",
            b"daily body",
        );
        bodies.insert("http://m/daily.cvd".to_string(), forged);
        let client = MapClient::new(bodies);
        let cache = cache();
        let pipeline = Pipeline::new(client, cache.clone(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(cache.get("daily.cvd").is_none());
        // the patch rides on the parsed version, not on admission
        assert!(cache.get("daily-300.cdiff").is_some());
        assert!(cache.get("main.cvd").is_some());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "daily.cvd");
        assert!(report.failed[0].1.contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn header_problems_block_only_under_strict_options() {
        let body = b"daily body";
        let digest = format!("{:x}", md5::compute(body));
        let bad_time = cvd_bytes(
            &format!("not a time:300:1741572:63:{digest}:QC2Zn:neo:1488891746"),
            body,
        );
        let mut bodies = full_mirror();
        bodies.insert("http://m/daily.cvd".to_string(), bad_time);

        let strict_cache = cache();
        let strict = Pipeline::new(
            MapClient::new(bodies.clone()),
            strict_cache.clone(),
            SyncOptions::default(),
        );
        let report = strict.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(report.failed.iter().any(|(f, e)| f == "daily.cvd" && e.contains("problem")));
        assert!(strict_cache.get("daily.cvd").is_none());
        assert!(strict_cache.get("daily-300.cdiff").is_some());

        let lenient_cache = cache();
        let lenient = Pipeline::new(
            MapClient::new(bodies),
            lenient_cache.clone(),
            SyncOptions { strict_headers: false, ..SyncOptions::default() },
        );
        let report = lenient.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert!(lenient_cache.get("daily.cvd").is_some());
        assert!(lenient_cache.get("daily-300.cdiff").is_some());
    }

    #[tokio::test]
    async fn missing_patch_fails_only_the_chained_child() {
        let mut bodies = full_mirror();
        bodies.remove("http://m/daily-300.cdiff");
        let client = MapClient::new(bodies);
        let cache = cache();
        let pipeline = Pipeline::new(client, cache.clone(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(cache.get("daily.cvd").is_some());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "daily-300.cdiff");
    }

    #[tokio::test]
    async fn failover_routes_every_fetch_through_secondary() {
        let bodies: HashMap<String, Vec<u8>> = full_mirror()
            .into_iter()
            .map(|(url, body)| (url.replace("http://m", "http://backup"), body))
            .collect();
        let client = MapClient::new(bodies);
        let pipeline = Pipeline::new(client.clone(), cache(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m", "http://backup"])).await.unwrap();
        assert_eq!(report.mirror, "http://backup");
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert!(client.requested().iter().all(|url| url.starts_with("http://backup/")));
    }

    #[tokio::test]
    async fn no_reachable_mirror_aborts_before_any_fetch() {
        let client = MapClient::new(HashMap::new());
        let pipeline = Pipeline::new(client.clone(), cache(), SyncOptions::default());

        let err = pipeline.run(&mirrors(&["http://m"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(FetchError::NoMirror { count: 1 })));
        assert!(client.requested().is_empty());
    }

    #[tokio::test]
    async fn truncated_artifact_is_a_structural_failure() {
        let mut bodies = full_mirror();
        bodies.insert("http://m/daily.cvd".to_string(), b"way too short".to_vec());
        let cache = cache();
        let pipeline = Pipeline::new(MapClient::new(bodies), cache.clone(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(report.failed.iter().any(|(f, e)| f == "daily.cvd" && e.contains("truncated")));
        // nothing parsed, so nothing to chain from
        assert!(cache.get("daily-300.cdiff").is_none());
    }

    #[tokio::test]
    async fn oversized_artifact_is_refused_and_run_continues() {
        let mut bodies = full_mirror();
        bodies.insert("http://m/daily.cvd".to_string(), valid_cvd(300, &vec![0u8; 2048]));
        let client = MapClient::new(bodies);
        let cache = cache();
        let pipeline = Pipeline::new(client, cache.clone(), SyncOptions::default());

        let report = pipeline.run(&mirrors(&["http://m"])).await.unwrap();
        assert!(cache.get("daily.cvd").is_none());
        assert!(cache.get("daily-300.cdiff").is_some());
        assert!(cache.get("main.cvd").is_some());
        assert!(report.failed.iter().any(|(f, e)| f == "daily.cvd" && e.contains("cap")));
    }
}
