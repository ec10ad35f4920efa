//! Restart and shutdown handoff
//!
//! Both endpoints answer first and act later: the work runs on a spawned
//! task after [`HANDOFF_DELAY`] so the HTTP response can flush before the
//! process exits.

use faqhub_common::launcher::{sibling_binary, LaunchError};
use faqhub_common::{DetachedLauncher, ProcessLauncher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

pub const HANDOFF_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartMode {
    /// Run the updater, which starts the service again when done
    ThroughUpdater,
    /// Start the current build again
    Direct,
}

impl RestartMode {
    pub fn from_settings(reload_with_updater: bool) -> Self {
        if reload_with_updater {
            RestartMode::ThroughUpdater
        } else {
            RestartMode::Direct
        }
    }
}

pub trait Handoff: Send + Sync {
    fn restart(&self, mode: RestartMode);
    fn shutdown(&self);
}

/// Spawns the next process, then exits this one
pub struct ProcessHandoff {
    work_dir: PathBuf,
    service_args: Vec<String>,
    delay: Duration,
}

impl ProcessHandoff {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            service_args: std::env::args().skip(1).collect(),
            delay: HANDOFF_DELAY,
        }
    }

    /// Arguments the service is started with again
    pub fn with_service_args(mut self, args: Vec<String>) -> Self {
        self.service_args = args;
        self
    }

    /// Processes to try in order. Going through the updater falls back to
    /// a direct restart so the service is not left down.
    fn candidates(&self, mode: RestartMode) -> Vec<(PathBuf, Vec<String>)> {
        let direct = (
            std::env::current_exe().unwrap_or_else(|_| sibling_binary("faqhubd")),
            self.service_args.clone(),
        );

        match mode {
            RestartMode::ThroughUpdater => {
                let mut args = vec![
                    "--work-dir".to_string(),
                    self.work_dir.to_string_lossy().into_owned(),
                    "--".to_string(),
                ];
                args.extend(self.service_args.iter().cloned());
                vec![(sibling_binary("faqhub-updater"), args), direct]
            }
            RestartMode::Direct => vec![direct],
        }
    }
}

/// Launch the first candidate that starts. Returns the one that did.
fn launch_first<F>(candidates: &[(PathBuf, Vec<String>)], launch: F) -> Option<PathBuf>
where
    F: Fn(&Path, &[String]) -> Result<(), LaunchError>,
{
    for (target, args) in candidates {
        match launch(target, args) {
            Ok(()) => return Some(target.clone()),
            Err(e) => warn!("Restart handoff failed: {}", e),
        }
    }
    None
}

impl Handoff for ProcessHandoff {
    fn restart(&self, mode: RestartMode) {
        let candidates = self.candidates(mode);
        let work_dir = self.work_dir.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let launched = launch_first(&candidates, |target, args| {
                DetachedLauncher::new(&work_dir)
                    .with_args(args.to_vec())
                    .relaunch(target)
            });

            match launched {
                Some(target) => {
                    info!("Handed off to {} ({:?}), exiting", target.display(), mode);
                    std::process::exit(0);
                }
                None => error!("No process could be started, staying up"),
            }
        });
    }

    fn shutdown(&self) {
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Shutting down on request");
            std::process::exit(0);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_settings() {
        assert_eq!(RestartMode::from_settings(true), RestartMode::ThroughUpdater);
        assert_eq!(RestartMode::from_settings(false), RestartMode::Direct);
    }

    #[test]
    fn test_updater_gets_work_dir_and_service_args() {
        let handoff = ProcessHandoff::new("/srv/faqhub").with_service_args(vec![
            "--bind".to_string(),
            "0.0.0.0".to_string(),
        ]);
        let candidates = handoff.candidates(RestartMode::ThroughUpdater);
        assert_eq!(candidates.len(), 2);

        let (target, args) = &candidates[0];
        assert!(target.to_string_lossy().contains("faqhub-updater"));
        assert_eq!(args, &["--work-dir", "/srv/faqhub", "--", "--bind", "0.0.0.0"]);

        let (_, direct_args) = &candidates[1];
        assert_eq!(direct_args, &["--bind", "0.0.0.0"]);
    }

    #[test]
    fn test_direct_restart_has_one_candidate() {
        let handoff = ProcessHandoff::new("/srv/faqhub").with_service_args(vec![]);
        assert_eq!(handoff.candidates(RestartMode::Direct).len(), 1);
    }

    fn not_found(target: &Path) -> LaunchError {
        LaunchError {
            path: target.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
    }

    #[test]
    fn test_missing_updater_falls_back_to_direct() {
        let candidates = vec![
            (PathBuf::from("faqhub-updater"), vec![]),
            (PathBuf::from("/srv/faqhub/faqhubd"), vec![]),
        ];
        let launched = launch_first(&candidates, |target, _| {
            if target.ends_with("faqhub-updater") {
                Err(not_found(target))
            } else {
                Ok(())
            }
        });
        assert_eq!(launched, Some(PathBuf::from("/srv/faqhub/faqhubd")));
    }

    #[test]
    fn test_nothing_launched_keeps_running() {
        let candidates = vec![(PathBuf::from("faqhub-updater"), vec![])];
        assert_eq!(launch_first(&candidates, |target, _| Err(not_found(target))), None);
    }
}
