use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cvdmirror::cache::DefinitionCache;
use cvdmirror::config::Config;
use cvdmirror::pipeline::{Pipeline, SyncOptions};
use cvdmirror::serve;
use cvdmirror_fetch::MirrorClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cvdmirror", version, about = "Mirror antivirus signature databases")]
struct Cli {
    /// TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the serving port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the seconds between sync runs.
    #[arg(long)]
    interval: Option<u64>,

    /// Do not chase incremental patches after full artifacts.
    #[arg(long)]
    no_follow_diffs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(interval) = cli.interval {
        config.update_interval_secs = interval;
    }
    if cli.no_follow_diffs {
        config.follow_diffs = false;
    }

    let cache = DefinitionCache::new(
        config.cache_capacity_bytes,
        Duration::from_secs(config.cache_ttl_secs),
        config.max_entry_bytes,
    );
    let client = Arc::new(MirrorClient::new(config.timeouts())?);
    let options = SyncOptions {
        follow_diffs: config.follow_diffs,
        strict_headers: config.strict_headers,
    };
    let pipeline = Arc::new(Pipeline::new(client, cache.clone(), options));

    let mirrors: Arc<[String]> = config.mirrors.clone().into();
    let every = Duration::from_secs(config.update_interval_secs.max(1));
    {
        let pipeline = pipeline.clone();
        let mirrors = mirrors.clone();
        // first tick fires immediately, seeding the cache in the
        // background while the server binds
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                sync_once(&pipeline, &mirrors).await;
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    info!(port = config.port, "serving cached definitions");
    axum::serve(listener, serve::router(cache)).await?;
    Ok(())
}

async fn sync_once(pipeline: &Pipeline<MirrorClient>, mirrors: &[String]) {
    match pipeline.run(mirrors).await {
        Ok(report) => info!(
            mirror = %report.mirror,
            admitted = report.admitted.len(),
            failed = report.failed.len(),
            "sync run finished"
        ),
        Err(err) => error!(error = %err, "sync run aborted"),
    }
}
