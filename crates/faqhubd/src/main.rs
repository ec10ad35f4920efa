//! faqhub daemon - FAQ storage, uploads and the admin editor backend.

use anyhow::{Context, Result};
use clap::Parser;
use faqhub_common::{Settings, SETTINGS_FILE};
use faqhubd::control::ProcessHandoff;
use faqhubd::server::{self, AppState};
use std::fs::OpenOptions;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Long-lived service log, appended across restarts
const SERVICE_LOG_FILE: &str = "service.log";

#[derive(Parser)]
#[command(name = "faqhubd")]
#[command(author, version, about = "faqhub FAQ service", long_about = None)]
struct Cli {
    /// Deployment directory holding settings.json and the data files
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,

    /// Address to listen on; the port comes from settings.json
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,
}

fn init_logging(work_dir: &Path) -> Result<()> {
    let log_path = work_dir.join(SERVICE_LOG_FILE);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let work_dir = cli
        .work_dir
        .canonicalize()
        .with_context(|| format!("Work dir {} not accessible", cli.work_dir.display()))?;

    init_logging(&work_dir)?;
    info!("faqhubd v{} starting in {}", env!("CARGO_PKG_VERSION"), work_dir.display());

    // Refuse to run on missing or corrupt config
    let settings = Settings::load(&work_dir.join(SETTINGS_FILE))?;
    info!(
        "Deployed release {} from {}",
        settings.current_ver,
        settings.repo_slug()
    );

    let addr = SocketAddr::new(cli.bind, settings.port);
    let service_args = vec![
        "--work-dir".to_string(),
        work_dir.to_string_lossy().into_owned(),
        "--bind".to_string(),
        cli.bind.to_string(),
    ];
    let handoff = Arc::new(ProcessHandoff::new(&work_dir).with_service_args(service_args));
    let state = AppState::new(settings, work_dir, handoff);

    server::run(state, addr).await
}
