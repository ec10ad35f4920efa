//! Persistent service settings (`settings.json`).
//!
//! Read once at process start. The updater rewrites the file after a
//! successful update to record the new `current_ver`; keys it does not
//! know about are carried through untouched.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write settings {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Release feed owner
    pub repo_owner: String,

    /// Release feed repository
    pub repo_name: String,

    /// Installed release tag, compared verbatim against the feed
    pub current_ver: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Admin credential for the editor and control endpoints
    #[serde(default)]
    pub admin_cookie: String,

    /// Notification relay token (unused by the service itself)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bot_admins: Vec<serde_json::Value>,

    /// When false, a restart skips the updater and relaunches the current build
    #[serde(default = "default_reload_with_updater")]
    pub reload_with_updater: bool,

    /// Release API host
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Package install program and arguments; the manifest path is appended
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_port() -> u16 {
    5000
}

fn default_reload_with_updater() -> bool {
    true
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

// Release archives ship the admin tooling's requirements.txt; deployments
// without Python set `install_command` in settings.json.
fn default_install_command() -> Vec<String> {
    vec!["pip".to_string(), "install".to_string(), "-r".to_string()]
}

impl Settings {
    /// Load settings from disk. Any failure is reported; callers decide
    /// whether it is fatal.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings back as pretty JSON, via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, path).map_err(write_err)?;
        Ok(())
    }

    /// `owner/repo` slug
    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "repo_owner": "acme",
        "repo_name": "faq",
        "current_ver": "1.0",
        "port": 8080,
        "admin_cookie": "s3cret",
        "bot_token": "123:abc",
        "bot_admins": [42],
        "theme": "dark"
    }"#;

    #[test]
    fn test_defaults_applied() {
        let settings: Settings = serde_json::from_str(
            r#"{"repo_owner":"a","repo_name":"b","current_ver":"v1"}"#,
        )
        .unwrap();

        assert_eq!(settings.port, 5000);
        assert!(settings.reload_with_updater);
        assert_eq!(settings.api_base, "https://api.github.com");
        assert_eq!(settings.install_command, vec!["pip", "install", "-r"]);
        assert!(settings.admin_cookie.is_empty());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, SAMPLE).unwrap();

        let mut settings = Settings::load(&path).unwrap();
        assert_eq!(settings.repo_slug(), "acme/faq");
        settings.current_ver = "1.1".to_string();
        settings.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["current_ver"], "1.1");
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["bot_token"], "123:abc");
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Read { .. })
        ));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
