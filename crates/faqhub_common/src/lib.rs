//! faqhub common library - settings, release fetching and the self-updater.

pub mod audit;
pub mod exclusions;
pub mod extractor;
pub mod github_releases;
pub mod installer;
pub mod launcher;
pub mod settings;
pub mod updater;

// Re-exports
pub use audit::{AuditLog, AuditSink, MemorySink};
pub use exclusions::ExclusionList;
pub use extractor::{extract, ExtractError, ExtractReport};
pub use github_releases::{CheckOutcome, FetchError, Release, ReleaseAsset, ReleaseClient};
pub use installer::{DependencyInstaller, InstallResult};
pub use launcher::{DetachedLauncher, LaunchError, ProcessLauncher};
pub use settings::{Settings, SettingsError};
pub use updater::{RunState, RunSummary, UpdateError, UpdatePaths, Updater};

/// Archive asset name expected in every release
pub const ARCHIVE_NAME: &str = "main.zip";

/// Settings file name, relative to the work dir
pub const SETTINGS_FILE: &str = "settings.json";

/// Exclusion list file name, relative to the work dir
pub const EXCLUDE_FILE: &str = "update_exclude.txt";

/// Per-run updater log, overwritten each run
pub const UPDATE_LOG_FILE: &str = "update_log.txt";

/// Default dependency manifest
pub const MANIFEST_FILE: &str = "requirements.txt";
