use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use ipcert::config::Config;
use ipcert::orchestrator::{CaHandle, Orchestrator};
use ipcert::state::StateStore;
use ipcert_zerossl::ZeroSslClient;

/// Issue and renew ZeroSSL certificates for IP-address subjects.
#[derive(Debug, Parser)]
#[command(name = "ipcert", version, about)]
struct Cli {
    /// Renew recorded certificates only; do not issue new ones.
    #[arg(long)]
    renew: bool,

    /// Path to the YAML configuration file.
    #[arg(short, long, env = "IPCERT_CONFIG")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}\n");
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data dir {}", config.data_dir.display())
    })?;
    init_logging(&config)?;

    let state_path = config.data_dir.join("current.yaml");
    let store = StateStore::load(&state_path)
        .with_context(|| format!("failed to load state from {}", state_path.display()))?;

    let clean_unfinished = config.clean_unfinished;
    let mut orchestrator = Orchestrator::new(config, store, |api_key: &str| {
        Arc::new(ZeroSslClient::new(api_key)) as CaHandle
    });

    if cli.renew {
        info!("running in renew-only mode");
        orchestrator.renew_all().await;
    } else {
        orchestrator.issue_all().await;
    }

    if clean_unfinished {
        orchestrator.clean_unfinished().await;
    }

    Ok(())
}

/// Log to stdout and the configured log file at once. ANSI is disabled
/// so the file stays grep-clean; cron captures stdout anyway.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| {
            format!("failed to open log file {}", config.log_file.display())
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::io::stdout.and(Arc::new(log_file)))
        .init();
    Ok(())
}
