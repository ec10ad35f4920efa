//! Self-update orchestrator
//!
//! One run walks:
//!   Idle -> Checking -> NoUpdate
//!                    -> Failed            (fetch error, asset missing)
//!                    -> Downloading -> Extracting -> InstallingDeps -> Done
//!
//! Guarantees:
//! 1. `current_ver` is only rewritten after extraction and the dependency
//!    step have both finished without a fatal error
//! 2. A dependency install failure is logged but does not fail the run
//! 3. The run log is written on every exit path
//! 4. The service is relaunched after every run, failed or not, unless the
//!    settings file itself could not be read
//!
//! Runs are not locked against each other; callers start at most one.

use crate::audit::{AuditLog, MemorySink};
use crate::exclusions::ExclusionList;
use crate::extractor;
use crate::github_releases::{CheckOutcome, ReleaseClient};
use crate::installer::{DependencyInstaller, InstallResult};
use crate::launcher::ProcessLauncher;
use crate::settings::{Settings, SettingsError};
use crate::{ARCHIVE_NAME, EXCLUDE_FILE, MANIFEST_FILE, SETTINGS_FILE, UPDATE_LOG_FILE};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

const COMPONENT: &str = "updater";

/// Lines of installer output copied into the audit log on failure
const INSTALL_OUTPUT_TAIL: usize = 20;

#[derive(Error, Debug)]
pub enum UpdateError {
    /// Nothing can run without settings, so no relaunch either
    #[error("settings unreadable: {0}")]
    ConfigUnreadable(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Checking,
    NoUpdate,
    Downloading,
    Extracting,
    InstallingDeps,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::NoUpdate | RunState::Done | RunState::Failed)
    }
}

/// File locations for one deployment
#[derive(Debug, Clone)]
pub struct UpdatePaths {
    pub work_dir: PathBuf,
    pub settings: PathBuf,
    pub exclusions: PathBuf,
    pub manifest: PathBuf,
    pub archive: PathBuf,
    pub run_log: PathBuf,
}

impl UpdatePaths {
    /// Default file names inside `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            settings: work_dir.join(SETTINGS_FILE),
            exclusions: work_dir.join(EXCLUDE_FILE),
            manifest: work_dir.join(MANIFEST_FILE),
            archive: work_dir.join(ARCHIVE_NAME),
            run_log: work_dir.join(UPDATE_LOG_FILE),
            work_dir,
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    /// Outcome of the release check
    pub outcome: CheckOutcome,
    /// Version recorded in settings after the run
    pub version: String,
    pub install: Option<InstallResult>,
    pub relaunched: bool,
}

pub struct Updater<L: ProcessLauncher> {
    paths: UpdatePaths,
    launcher: L,
    relaunch_target: Option<PathBuf>,
    state: RunState,
    last_log: MemorySink,
}

impl<L: ProcessLauncher> Updater<L> {
    pub fn new(paths: UpdatePaths, launcher: L) -> Self {
        Self {
            paths,
            launcher,
            relaunch_target: None,
            state: RunState::Idle,
            last_log: MemorySink::new(),
        }
    }

    /// Executable started once the run is over
    pub fn with_relaunch_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.relaunch_target = Some(target.into());
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Audit lines of the most recent run
    pub fn audit_lines(&self) -> &[String] {
        self.last_log.lines()
    }

    /// Run one full update cycle and hand off to the service.
    pub async fn run(&mut self) -> Result<RunSummary, UpdateError> {
        self.state = RunState::Idle;
        let mut sink = MemorySink::new();

        let result = {
            let mut log = AuditLog::new(COMPONENT, &mut sink);
            let result = self.execute(&mut log).await;

            let relaunch = match (&result, &self.relaunch_target) {
                (Ok(_), Some(target)) => {
                    log.record(format!("starting {}...", target.display()));
                    Some(target.clone())
                }
                _ => None,
            };

            log.record(format!(
                "log available in {}\nexit.",
                self.paths.run_log.display()
            ));
            (result, relaunch)
        };

        if let Err(e) = sink.flush_to(&self.paths.run_log) {
            warn!("Failed to write {}: {}", self.paths.run_log.display(), e);
        }
        self.last_log = sink;

        let (result, relaunch) = result;
        let mut summary = result?;

        if let Some(target) = relaunch {
            match self.launcher.relaunch(&target) {
                Ok(()) => summary.relaunched = true,
                Err(e) => error!("Handoff failed: {}", e),
            }
        }

        Ok(summary)
    }

    fn set_state(&mut self, next: RunState) {
        debug!("update state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn execute(&mut self, log: &mut AuditLog<'_>) -> Result<RunSummary, UpdateError> {
        self.set_state(RunState::Checking);

        let mut settings = match Settings::load(&self.paths.settings) {
            Ok(settings) => settings,
            Err(e) => {
                log.record(format!("{}! exit...", e));
                self.set_state(RunState::Failed);
                return Err(UpdateError::ConfigUnreadable(e));
            }
        };

        let client = ReleaseClient::from_settings(&settings);
        let outcome = client
            .check_and_download(&settings.current_ver, &self.paths.archive, log)
            .await;

        let ready = match &outcome {
            CheckOutcome::DownloadReady { tag } => Some(tag.clone()),
            _ => None,
        };

        let Some(tag) = ready else {
            let (prefix, state) = if outcome == CheckOutcome::NoUpdate {
                ("nothing to do", RunState::NoUpdate)
            } else {
                ("update failed", RunState::Failed)
            };
            log.record(format!(
                "{}. code: {} ({})",
                prefix,
                outcome.code(),
                outcome.description()
            ));
            self.set_state(state);
            return Ok(self.summary(outcome, &settings, None));
        };

        self.set_state(RunState::Downloading);
        let install = match self.apply(&settings, log) {
            Ok(install) => install,
            Err(reason) => {
                log.record(format!("update failed: {}", reason));
                self.set_state(RunState::Failed);
                return Ok(self.summary(outcome, &settings, None));
            }
        };

        let previous = std::mem::replace(&mut settings.current_ver, tag.clone());
        if let Err(e) = settings.save(&self.paths.settings) {
            log.record(format!("update failed: {}", e));
            settings.current_ver = previous;
            self.set_state(RunState::Failed);
            return Ok(self.summary(outcome, &settings, Some(install)));
        }

        log.record(format!("updated successfully! {} -> {}", previous, tag));
        self.set_state(RunState::Done);
        Ok(self.summary(outcome, &settings, Some(install)))
    }

    /// Extract and reinstall. `Err` means the run is fatal.
    fn apply(&mut self, settings: &Settings, log: &mut AuditLog<'_>) -> Result<InstallResult, String> {
        self.set_state(RunState::Extracting);

        let exclusions = ExclusionList::load(&self.paths.exclusions)
            .map_err(|e| format!("cannot read {}: {}", self.paths.exclusions.display(), e))?;
        if !exclusions.is_empty() {
            log.record(format!(
                "preserving {} excluded path(s)",
                exclusions.patterns().len()
            ));
        }

        log.record(format!("unpacking {}...", ARCHIVE_NAME));
        let report = extractor::extract(
            &self.paths.archive,
            &self.paths.work_dir,
            &exclusions,
            log,
        )
        .map_err(|e| e.to_string())?;
        log.record(format!(
            "unpacking complete! {} extracted, {} preserved\ndeleted {}",
            report.extracted.len(),
            report.skipped.len(),
            ARCHIVE_NAME
        ));

        self.set_state(RunState::InstallingDeps);
        let installer = DependencyInstaller::new(&settings.install_command, &self.paths.work_dir);
        let result = installer.install(&self.paths.manifest);
        record_install(&result, &self.paths.manifest, log);
        Ok(result)
    }

    fn summary(
        &self,
        outcome: CheckOutcome,
        settings: &Settings,
        install: Option<InstallResult>,
    ) -> RunSummary {
        RunSummary {
            state: self.state,
            outcome,
            version: settings.current_ver.clone(),
            install,
            relaunched: false,
        }
    }
}

fn record_install(result: &InstallResult, manifest: &Path, log: &mut AuditLog<'_>) {
    match result {
        InstallResult::Skipped => {
            log.record(format!(
                "{} not found, skipping dependency install",
                manifest.display()
            ));
        }
        InstallResult::Installed { .. } => log.record("dependencies installed."),
        InstallResult::Failed { reason, output } => {
            let lines: Vec<&str> = output.lines().collect();
            let tail = &lines[lines.len().saturating_sub(INSTALL_OUTPUT_TAIL)..];
            if tail.is_empty() {
                log.record(format!("dependency install failed: {}", reason));
            } else {
                log.record(format!(
                    "dependency install failed: {}\n{}",
                    reason,
                    tail.join("\n")
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::LaunchError;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct RecordingLauncher {
        calls: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl ProcessLauncher for RecordingLauncher {
        fn relaunch(&self, executable: &Path) -> Result<(), LaunchError> {
            self.calls.lock().unwrap().push(executable.to_path_buf());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_settings_does_not_relaunch() {
        let dir = TempDir::new().unwrap();
        let launcher = RecordingLauncher::default();
        let mut updater = Updater::new(UpdatePaths::new(dir.path()), launcher.clone())
            .with_relaunch_target("faqhubd");

        let err = updater.run().await.unwrap_err();
        assert!(matches!(err, UpdateError::ConfigUnreadable(_)));
        assert_eq!(updater.state(), RunState::Failed);
        assert!(launcher.calls.lock().unwrap().is_empty());

        let log = std::fs::read_to_string(dir.path().join(UPDATE_LOG_FILE)).unwrap();
        assert!(log.contains("exit..."));
    }

    #[tokio::test]
    async fn test_unreachable_feed_fails_but_relaunches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"repo_owner":"a","repo_name":"b","current_ver":"1.0","api_base":"http://127.0.0.1:9"}"#,
        )
        .unwrap();

        let launcher = RecordingLauncher::default();
        let mut updater = Updater::new(UpdatePaths::new(dir.path()), launcher.clone())
            .with_relaunch_target("faqhubd");
        let summary = updater.run().await.unwrap();

        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.outcome.code(), -1);
        assert_eq!(summary.version, "1.0");
        assert!(summary.relaunched);
        assert_eq!(*launcher.calls.lock().unwrap(), vec![PathBuf::from("faqhubd")]);
        assert!(updater
            .audit_lines()
            .iter()
            .any(|l| l.contains("update failed. code: -1")));
    }

    #[test]
    fn test_install_failure_output_is_tailed() {
        let mut sink = MemorySink::new();
        let mut log = AuditLog::new(COMPONENT, &mut sink);
        let output: String = (0..50).map(|i| format!("line {}\n", i)).collect();
        record_install(
            &InstallResult::Failed {
                reason: "pip exited with exit status: 1".into(),
                output,
            },
            Path::new("requirements.txt"),
            &mut log,
        );

        let line = &sink.lines()[0];
        assert!(line.contains("dependency install failed"));
        assert!(line.contains("line 49"));
        assert!(!line.contains("line 29\n"));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::NoUpdate.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Extracting.is_terminal());
    }
}
