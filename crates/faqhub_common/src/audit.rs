//! Update audit trail
//!
//! Lines are formatted as `[<component>] - [<local timestamp>]: <message>`
//! and handed to an [`AuditSink`]. The updater collects a whole run in a
//! [`MemorySink`] and writes it out once at the end.

use chrono::Local;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

/// Append-only destination for audit lines
pub trait AuditSink {
    fn append(&mut self, line: String);
}

/// In-memory sink, flushed to a file once per run
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Overwrite `path` with every collected line
    pub fn flush_to(&self, path: &Path) -> io::Result<()> {
        let mut content = self.lines.join("\n");
        content.push('\n');
        fs::write(path, content)
    }
}

impl AuditSink for MemorySink {
    fn append(&mut self, line: String) {
        self.lines.push(line);
    }
}

/// Formats audit lines for one component and forwards them to a sink.
pub struct AuditLog<'a> {
    component: &'static str,
    sink: &'a mut dyn AuditSink,
}

impl<'a> AuditLog<'a> {
    pub fn new(component: &'static str, sink: &'a mut dyn AuditSink) -> Self {
        Self { component, sink }
    }

    /// Record one entry. Multi-line messages stay a single entry.
    pub fn record(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("[{}]: {}", self.component, message);
        self.sink.append(format_line(self.component, message));
    }
}

pub fn format_line(component: &str, message: &str) -> String {
    format!(
        "[{}] - [{}]: {}",
        component,
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )
}
