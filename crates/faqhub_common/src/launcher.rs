//! Process handoff
//!
//! The updater relaunches the service through a [`ProcessLauncher`] so the
//! mechanism can be swapped out in tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("failed to launch {path}: {source}")]
pub struct LaunchError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

pub trait ProcessLauncher {
    /// Start `executable` without waiting for it
    fn relaunch(&self, executable: &Path) -> Result<(), LaunchError>;
}

/// Spawns a detached child in `work_dir` with extra arguments
#[derive(Debug, Clone)]
pub struct DetachedLauncher {
    work_dir: PathBuf,
    args: Vec<String>,
}

impl DetachedLauncher {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl ProcessLauncher for DetachedLauncher {
    fn relaunch(&self, executable: &Path) -> Result<(), LaunchError> {
        let mut command = Command::new(executable);
        command
            .args(&self.args)
            .current_dir(&self.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group so the child survives the parent exiting
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command.spawn().map(|_| ()).map_err(|source| LaunchError {
            path: executable.to_path_buf(),
            source,
        })
    }
}

/// Sibling binary next to the current executable, falling back to a PATH lookup
pub fn sibling_binary(name: &str) -> PathBuf {
    let file_name = format!("{}{}", name, std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_executable_errors() {
        let dir = TempDir::new().unwrap();
        let launcher = DetachedLauncher::new(dir.path());
        let err = launcher
            .relaunch(&dir.path().join("does-not-exist"))
            .unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawns_detached() {
        let dir = TempDir::new().unwrap();
        let launcher = DetachedLauncher::new(dir.path()).with_args(vec!["-c".into(), "true".into()]);
        assert!(launcher.relaunch(Path::new("/bin/sh")).is_ok());
    }

    #[test]
    fn test_sibling_binary_fallback() {
        let path = sibling_binary("faqhub-surely-absent");
        assert!(path.to_string_lossy().starts_with("faqhub-surely-absent"));
    }
}
