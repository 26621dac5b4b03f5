//! consuldiff - watch Consul KV for drift.
//!
//! Polls a key prefix, logs every added, modified and deleted key, keeps the
//! latest snapshot on disk and optionally commits it to a git repository.

mod logging;
mod shutdown;

use anyhow::Context;
use clap::Parser;
use consuldiff_consul::ConsulClient;
use consuldiff_core::{Config, CycleController, LogReporter};
use consuldiff_git::GitPublisher;
use consuldiff_storage::JsonSnapshotStore;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "consuldiff")]
#[command(author, version, about = "Watch Consul KV for drift and keep an audit trail in git", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Read environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before logging, so RUST_LOG can come from the file too.
    let env_file = load_env(cli.env_file.as_deref())?;
    logging::init_logging(cli.verbose);
    match env_file {
        Some(path) => info!(path = %path.display(), "Loaded environment file"),
        None => debug!("No .env file found, using process environment"),
    }

    let config = Config::from_env().context("Invalid configuration")?;
    config.log_summary();

    let client =
        ConsulClient::new(config.consul.clone()).context("Failed to create Consul client")?;
    let store = JsonSnapshotStore::new(&config.storage_dir);
    let publisher = match &config.git {
        Some(settings) => Some(
            GitPublisher::connect(settings.clone())
                .await
                .context("Failed to prepare git repository")?,
        ),
        None => None,
    };

    let mut controller = CycleController::new(&config, client, store, publisher, LogReporter);

    if cli.once {
        let report = controller.run_cycle().await.context("Cycle failed")?;
        info!(
            kind = report.kind.as_str(),
            keys = report.keys,
            changes = report.changes.len(),
            persisted = report.persisted,
            "Cycle finished"
        );
        if !report.persisted {
            anyhow::bail!("Snapshot files were not written");
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    shutdown::spawn_signal_handler(shutdown.clone());
    controller.run(shutdown).await;

    Ok(())
}

/// Load variables from `path`, or from `./.env` when it exists.
///
/// Variables already set in the process environment win.
fn load_env(path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load environment file {}", path.display()))?;
            Ok(Some(path.to_path_buf()))
        }
        None => match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e).context("Failed to load .env"),
        },
    }
}
