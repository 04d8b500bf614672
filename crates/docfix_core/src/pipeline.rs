use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::changelog::{ChangeLog, DEFAULT_LOG_DIR};
use crate::walker::{default_extensions, documentation_files, normalize_path};

/// Result of normalizing one document: the new text when anything changed,
/// and one change entry per rewrite.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub content: Option<String>,
    pub log: ChangeLog,
}

pub trait DocumentNormalizer {
    fn name(&self) -> &'static str;
    fn log_file_name(&self) -> &'static str;
    /// `path` is only used to label change entries.
    fn normalize(&self, path: &str, content: &str) -> Normalized;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub extensions: Vec<String>,
    pub log_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub rewritten: bool,
    pub log: ChangeLog,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub log: ChangeLog,
    pub log_path: PathBuf,
}

impl RunReport {
    pub fn summary_line(&self) -> String {
        format!(
            "Logged {} change(s) to {}",
            self.log.len(),
            normalize_path(&self.log_path)
        )
    }
}

/// Reads one file, normalizes it, and writes it back only when something
/// changed.
pub fn process_file<N: DocumentNormalizer + ?Sized>(
    normalizer: &N,
    path: &Path,
) -> Result<FileOutcome> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let normalized = normalizer.normalize(&normalize_path(path), &content);

    let rewritten = match normalized.content {
        Some(updated) => {
            fs::write(path, updated)
                .with_context(|| format!("failed to write {}", path.display()))?;
            true
        }
        None => false,
    };
    if rewritten {
        log::debug!(
            "{}: {} rewrite(s) in {}",
            normalizer.name(),
            normalized.log.len(),
            path.display()
        );
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        rewritten,
        log: normalized.log,
    })
}

/// Walks `root`, normalizes every documentation file, then writes the merged
/// change log. A failure stops the run; files already rewritten stay rewritten
/// and no log is written.
pub fn normalize_tree<N: DocumentNormalizer + ?Sized>(
    normalizer: &N,
    root: &Path,
    options: &RunOptions,
) -> Result<RunReport> {
    let mut changes = ChangeLog::new();
    let mut files_scanned = 0usize;
    let mut files_rewritten = 0usize;

    for path in documentation_files(root, &options.extensions) {
        let path = path?;
        files_scanned += 1;
        let outcome = process_file(normalizer, &path).inspect_err(|_| {
            log::error!(
                "{}: stopped after {files_scanned} file(s), {files_rewritten} rewritten",
                normalizer.name()
            );
        })?;
        if outcome.rewritten {
            files_rewritten += 1;
        }
        changes.merge(outcome.log);
    }

    let log_path = changes.write(&options.log_dir, normalizer.log_file_name())?;
    log::info!(
        "{}: scanned {files_scanned} file(s), rewrote {files_rewritten}, {} change(s)",
        normalizer.name(),
        changes.len()
    );

    Ok(RunReport {
        files_scanned,
        files_rewritten,
        log: changes,
        log_path,
    })
}
