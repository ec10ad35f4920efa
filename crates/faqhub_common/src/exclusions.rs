//! Exclusion list for selective extraction
//!
//! One pattern per line. A pattern ending in `/` covers that directory and
//! everything below it; any other pattern matches one exact path.

use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    patterns: Vec<String>,
}

impl ExclusionList {
    /// Load patterns from `path`. A missing file yields an empty list.
    pub fn load(path: &Path) -> io::Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn parse(content: &str) -> Self {
        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(normalize)
            .collect();

        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True if `candidate` is preserved during extraction
    pub fn should_skip(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        self.patterns.iter().any(|pattern| {
            candidate == *pattern || (pattern.ends_with('/') && candidate.starts_with(pattern.as_str()))
        })
    }
}

/// Forward slashes, no leading `./`
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}
