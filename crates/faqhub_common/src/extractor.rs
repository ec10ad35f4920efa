//! Selective archive extraction
//!
//! Entries are written in archive order. Entries matched by the exclusion
//! list are left alone on disk. There is no staging: a failure halfway
//! leaves a mix of old and new files.

use crate::audit::AuditLog;
use crate::exclusions::{normalize, ExclusionList};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("cannot open archive {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("corrupt archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("entry {0} escapes the destination directory")]
    UnsafePath(String),

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to each archive entry
#[derive(Debug, Default, Clone)]
pub struct ExtractReport {
    pub extracted: Vec<String>,
    pub skipped: Vec<String>,
}

/// Extract `archive` into `dest`, preserving excluded paths, then delete
/// the archive.
pub fn extract(
    archive: &Path,
    dest: &Path,
    exclusions: &ExclusionList,
    log: &mut AuditLog<'_>,
) -> Result<ExtractReport, ExtractError> {
    let file = File::open(archive).map_err(|source| ExtractError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut report = ExtractReport::default();

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let name = normalize(entry.name());

        if exclusions.should_skip(&name) {
            log.record(format!("skipped (excluded): {}", name));
            report.skipped.push(name);
            continue;
        }

        let relative =
            safe_relative_path(&name).ok_or_else(|| ExtractError::UnsafePath(name.clone()))?;
        let target = dest.join(relative);
        let write_err = |source| ExtractError::Write {
            path: target.clone(),
            source,
        };

        if name.ends_with('/') {
            fs::create_dir_all(&target).map_err(write_err)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
            let mode = entry.unix_mode();
            replace_file(&mut entry, &target, mode).map_err(write_err)?;
        }

        report.extracted.push(name);
    }

    fs::remove_file(archive).map_err(|source| ExtractError::Write {
        path: archive.to_path_buf(),
        source,
    })?;

    Ok(report)
}

/// Relative path for a normalized entry name, or `None` if it would land
/// outside the destination.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') {
        return None;
    }

    let mut path = PathBuf::new();
    for (i, part) in name.split('/').enumerate() {
        match part {
            "" | "." => continue,
            ".." => return None,
            // Drive prefix such as `C:`
            _ if i == 0 && part.ends_with(':') => return None,
            part => path.push(part),
        }
    }
    Some(path)
}

/// Write next to `target` and rename over it, so read-only files from an
/// earlier release are replaced rather than opened for writing.
fn replace_file(reader: &mut impl io::Read, target: &Path, mode: Option<u32>) -> io::Result<()> {
    let file_name = target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let staged = target.with_file_name(format!(".{}.new", file_name));

    let result = write_staged(reader, &staged, mode).and_then(|()| fs::rename(&staged, target));
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}

fn write_staged(reader: &mut impl io::Read, staged: &Path, mode: Option<u32>) -> io::Result<()> {
    let mut out = File::create(staged)?;
    io::copy(reader, &mut out)?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
