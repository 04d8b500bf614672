use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DEFAULT_LOG_DIR: &str = "changelog";
pub const COMMAND_LOG_FILENAME: &str = "command_changes.log";
pub const IMAGE_LOG_FILENAME: &str = "image_changes.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub path: String,
    pub line: usize,
    pub original: String,
    pub replacement: String,
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} -> {}",
            self.path, self.line, self.original, self.replacement
        )
    }
}

/// Ordered, append-only collection of change entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    entries: Vec<ChangeEntry>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    pub fn merge(&mut self, other: ChangeLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut output = String::new();
        for entry in &self.entries {
            output.push_str(&entry.to_string());
            output.push('\n');
        }
        output
    }

    /// Overwrite `dir/file_name` with one entry per line, creating `dir` first.
    pub fn write(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(file_name);
        fs::write(&path, self.render())
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
