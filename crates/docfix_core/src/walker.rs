use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub const DEFAULT_EXTENSIONS: [&str; 2] = ["md", "mdx"];

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()
}

/// Lazily yields every file under `root` whose name ends with one of
/// `extensions` (given with or without the leading dot). Symlinks to files are
/// included; symlinked directories are not descended into. Siblings come out
/// in file-name order. A walk error, including a missing root, is yielded as
/// an error item.
pub fn documentation_files<'a>(
    root: &'a Path,
    extensions: &'a [String],
) -> impl Iterator<Item = Result<PathBuf>> + 'a {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry.with_context(|| format!("failed to walk {}", root.display())) {
                Ok(entry) => entry,
                Err(error) => return Some(Err(error)),
            };
            if !is_document_file(&entry) {
                return None;
            }
            if !has_documentation_extension(entry.path(), extensions) {
                return None;
            }
            Some(Ok(entry.into_path()))
        })
}

fn is_document_file(entry: &walkdir::DirEntry) -> bool {
    if entry.file_type().is_file() {
        return true;
    }
    // Dangling links are skipped.
    entry.path_is_symlink()
        && fs::metadata(entry.path()).is_ok_and(|metadata| metadata.is_file())
}

pub fn has_documentation_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    extensions.iter().any(|extension| {
        let extension = extension.trim_start_matches('.');
        !extension.is_empty()
            && name
                .strip_suffix(extension)
                .is_some_and(|stem| stem.ends_with('.'))
    })
}

pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
