//! faqhub updater - runs one update cycle, then hands off to faqhubd.

use anyhow::{Context, Result};
use clap::Parser;
use faqhub_common::launcher::sibling_binary;
use faqhub_common::{DetachedLauncher, RunState, UpdateError, UpdatePaths, Updater};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "faqhub-updater")]
#[command(author, version, about = "Check the release feed and update this faqhub deployment", long_about = None)]
struct Cli {
    /// Deployment directory holding settings.json and the service files
    #[arg(short, long, default_value = ".")]
    work_dir: PathBuf,

    /// Settings file (default: <work-dir>/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Dependency manifest (default: <work-dir>/requirements.txt)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Service binary started after the run
    #[arg(long)]
    service: Option<PathBuf>,

    /// Do not start the service afterwards
    #[arg(long)]
    no_relaunch: bool,

    /// Arguments passed to the service when it is started again
    #[arg(last = true)]
    service_args: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let work_dir = cli
        .work_dir
        .canonicalize()
        .with_context(|| format!("Work dir {} not accessible", cli.work_dir.display()))?;

    let mut paths = UpdatePaths::new(&work_dir);
    if let Some(settings) = cli.settings {
        paths.settings = settings;
    }
    if let Some(manifest) = cli.manifest {
        paths.manifest = manifest;
    }

    let launcher = DetachedLauncher::new(&work_dir).with_args(cli.service_args);
    let mut updater = Updater::new(paths, launcher);
    if !cli.no_relaunch {
        let service = cli.service.unwrap_or_else(|| sibling_binary("faqhubd"));
        updater = updater.with_relaunch_target(service);
    }

    match updater.run().await {
        Ok(summary) => {
            info!(
                "Update run finished: {:?} (code {}), version {}",
                summary.state,
                summary.outcome.code(),
                summary.version
            );
            if summary.state == RunState::Failed {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(UpdateError::ConfigUnreadable(e)) => {
            error!("Cannot run without settings: {}", e);
            Ok(ExitCode::from(2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_args_follow_separator() {
        let cli = Cli::try_parse_from([
            "faqhub-updater",
            "--work-dir",
            "/srv/faqhub",
            "--",
            "--bind",
            "0.0.0.0",
        ])
        .unwrap();
        assert_eq!(cli.work_dir, PathBuf::from("/srv/faqhub"));
        assert_eq!(cli.service_args, vec!["--bind", "0.0.0.0"]);
    }

    #[test]
    fn test_no_service_args_by_default() {
        let cli = Cli::try_parse_from(["faqhub-updater"]).unwrap();
        assert!(cli.service_args.is_empty());
    }
}
