//! Release feed client
//!
//! Fetches the latest release from a GitHub-compatible API and downloads
//! its `main.zip` asset when the tag differs from the installed one.

use crate::audit::AuditLog;
use crate::settings::Settings;
use crate::ARCHIVE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Release information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    /// Find asset by exact name
    pub fn find_asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Result of a version check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Installed tag matches the feed
    NoUpdate,
    /// New tag found and the archive is on disk
    DownloadReady { tag: String },
    /// New tag found but it carries no `main.zip`
    AssetMissing { tag: String },
    /// Network, status or decoding failure
    FetchError(String),
}

impl CheckOutcome {
    pub fn code(&self) -> i32 {
        match self {
            CheckOutcome::NoUpdate => 0,
            CheckOutcome::DownloadReady { .. } => 1,
            CheckOutcome::AssetMissing { .. } => -2,
            CheckOutcome::FetchError(_) => -1,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CheckOutcome::NoUpdate => "no updates found.",
            CheckOutcome::DownloadReady { .. } => "archive downloaded.",
            CheckOutcome::AssetMissing { .. } => {
                "the target file was not found in the release assets."
            }
            CheckOutcome::FetchError(_) => "an error occurred during the update process.",
        }
    }
}

/// Exact tag comparison. Any difference counts as newer, including downgrades.
pub fn is_update_available(current: &str, latest: &str) -> bool {
    current != latest
}

/// Release API client
pub struct ReleaseClient {
    api_base: String,
    repo_owner: String,
    repo_name: String,
    http: reqwest::Client,
}

impl ReleaseClient {
    pub fn new(
        api_base: impl Into<String>,
        repo_owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        let http = match reqwest::Client::builder()
            .user_agent(format!("faqhub-updater/{}", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(http) => http,
            Err(e) => {
                // GitHub answers 403 to requests without a User-Agent
                warn!("HTTP client setup failed, requests go out without a User-Agent: {}", e);
                reqwest::Client::default()
            }
        };

        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repo_owner: repo_owner.into(),
            repo_name: repo_name.into(),
            http,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.api_base, &settings.repo_owner, &settings.repo_name)
    }

    pub fn latest_release_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base, self.repo_owner, self.repo_name
        )
    }

    /// Get the latest published release
    pub async fn get_latest_release(&self) -> Result<Release, FetchError> {
        let url = self.latest_release_url();
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status(),
            });
        }

        Ok(response.json().await?)
    }

    /// Download an asset to `dest`, replacing any existing file
    pub async fn download_asset(&self, asset: &ReleaseAsset, dest: &Path) -> Result<(), FetchError> {
        let response = self.http.get(&asset.browser_download_url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: asset.browser_download_url.clone(),
                status: response.status(),
            });
        }

        let bytes = response.bytes().await?;

        tokio::fs::write(dest, bytes)
            .await
            .map_err(|source| FetchError::Write {
                path: dest.to_path_buf(),
                source,
            })
    }

    /// Check the feed against `current_ver` and fetch the archive into
    /// `archive_path` if a different tag is published.
    pub async fn check_and_download(
        &self,
        current_ver: &str,
        archive_path: &Path,
        log: &mut AuditLog<'_>,
    ) -> CheckOutcome {
        log.record(format!(
            "current version is {}\nchecking for updates...",
            current_ver
        ));

        let release = match self.get_latest_release().await {
            Ok(release) => release,
            Err(e) => {
                log.record(format!("an error occurred: {}.", e));
                return CheckOutcome::FetchError(e.to_string());
            }
        };

        if !is_update_available(current_ver, &release.tag_name) {
            log.record("no updates found.");
            return CheckOutcome::NoUpdate;
        }

        log.record(format!(
            "new version found! {}, preparing to update...",
            release.tag_name
        ));

        let Some(asset) = release.find_asset(ARCHIVE_NAME) else {
            log.record(format!("{} not found in release assets!", ARCHIVE_NAME));
            return CheckOutcome::AssetMissing {
                tag: release.tag_name,
            };
        };

        log.record(format!(
            "downloading {} from {}...",
            ARCHIVE_NAME, asset.browser_download_url
        ));

        if let Err(e) = self.download_asset(asset, archive_path).await {
            log.record(format!("an error occurred: {}.", e));
            // never leave a truncated archive for the next run
            let _ = tokio::fs::remove_file(archive_path).await;
            return CheckOutcome::FetchError(e.to_string());
        }

        log.record(format!("download complete! ({})", ARCHIVE_NAME));
        CheckOutcome::DownloadReady {
            tag: release.tag_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_tag_comparison() {
        assert!(!is_update_available("1.0", "1.0"));
        assert!(is_update_available("1.0", "1.1"));
        // downgrades and cosmetic differences still count as updates
        assert!(is_update_available("2.0", "1.9"));
        assert!(is_update_available("v1.0", "1.0"));
    }

    #[test]
    fn test_outcome_codes() {
        assert_eq!(CheckOutcome::NoUpdate.code(), 0);
        assert_eq!(CheckOutcome::DownloadReady { tag: "x".into() }.code(), 1);
        assert_eq!(CheckOutcome::FetchError("boom".into()).code(), -1);
        assert_eq!(CheckOutcome::AssetMissing { tag: "x".into() }.code(), -2);
    }

    #[test]
    fn test_release_parsing() {
        let json = r#"{
            "tag_name": "1.1",
            "name": "ignored",
            "assets": [
                {"name": "main.zip.sha256", "browser_download_url": "https://x/a"},
                {"name": "main.zip", "browser_download_url": "https://x/b", "size": 12}
            ]
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert_eq!(release.find_asset("main.zip").unwrap().browser_download_url, "https://x/b");
        assert!(release.find_asset("main").is_none());
    }

    #[test]
    fn test_latest_release_url() {
        let client = ReleaseClient::new("https://api.github.com/", "acme", "faq");
        assert_eq!(
            client.latest_release_url(),
            "https://api.github.com/repos/acme/faq/releases/latest"
        );
    }
}
