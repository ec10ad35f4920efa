//! Dependency reinstall step
//!
//! Runs the configured package tool against the manifest shipped with the
//! release. Failures are reported, never raised: the updater keeps going.

use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallResult {
    /// No manifest present
    Skipped,
    Installed { output: String },
    Failed { reason: String, output: String },
}

pub struct DependencyInstaller {
    program: String,
    args: Vec<String>,
    work_dir: PathBuf,
}

impl DependencyInstaller {
    /// `command` is the program followed by its leading arguments
    pub fn new(command: &[String], work_dir: impl Into<PathBuf>) -> Self {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };

        Self {
            program,
            args,
            work_dir: work_dir.into(),
        }
    }

    pub fn install(&self, manifest: &Path) -> InstallResult {
        if !manifest.exists() {
            return InstallResult::Skipped;
        }

        if self.program.is_empty() {
            return InstallResult::Failed {
                reason: "no install command configured".to_string(),
                output: String::new(),
            };
        }

        let output = match Command::new(&self.program)
            .args(&self.args)
            .arg(manifest)
            .current_dir(&self.work_dir)
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                return InstallResult::Failed {
                    reason: format!("failed to run {}: {}", self.program, e),
                    output: String::new(),
                }
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            InstallResult::Installed { output: combined }
        } else {
            InstallResult::Failed {
                reason: format!("{} exited with {}", self.program, output.status),
                output: combined,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_manifest_skips() {
        let dir = TempDir::new().unwrap();
        let installer = DependencyInstaller::new(&cmd(&["false"]), dir.path());
        assert_eq!(
            installer.install(&dir.path().join("requirements.txt")),
            InstallResult::Skipped
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "flask==3.0\n").unwrap();

        let installer = DependencyInstaller::new(&cmd(&["cat"]), dir.path());
        match installer.install(&manifest) {
            InstallResult::Installed { output } => assert!(output.contains("flask==3.0")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_fails() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "").unwrap();

        let installer = DependencyInstaller::new(&cmd(&["false"]), dir.path());
        assert!(matches!(installer.install(&manifest), InstallResult::Failed { .. }));
    }

    #[test]
    fn test_unknown_program_fails() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "").unwrap();

        let installer = DependencyInstaller::new(&cmd(&["faqhub-no-such-tool"]), dir.path());
        match installer.install(&manifest) {
            InstallResult::Failed { reason, .. } => assert!(reason.contains("failed to run")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
