//! Filesystem helpers shared by the task pipes.
//!
//! The "entries" helpers deliberately degrade to an empty result with a
//! console diagnostic instead of failing the build when a source directory
//! is missing — a missing optional asset category (say, no fonts yet)
//! should not abort the whole run. The flip side is that a typo'd path
//! silently yields zero files, so every degradation is logged.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check a path for existence without surfacing permission noise.
pub fn check_access(path: &Path) -> bool {
    path.exists()
}

/// Recursively search `dir` for a file named `file_name`.
///
/// Returns the first match in walk order, or `None`. When `nested` is
/// false only the top level of `dir` is searched. Unreadable directories
/// are logged and treated as "not found".
pub fn find_file_in_dir(dir: &Path, file_name: &str, nested: bool) -> Option<PathBuf> {
    let depth = if nested { usize::MAX } else { 1 };
    for entry in WalkDir::new(dir).max_depth(depth).into_iter() {
        match entry {
            Ok(e) if e.file_type().is_file() => {
                if e.file_name().to_str() == Some(file_name) {
                    return Some(e.into_path());
                }
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("Error in find_file_in_dir: {err}");
            }
        }
    }
    None
}

/// Collect every regular file under `dir` (sorted walk order), applying a
/// path filter. A missing directory logs a diagnostic and yields nothing.
pub fn collect_files<F>(dir: &Path, mut keep: F) -> Vec<PathBuf>
where
    F: FnMut(&Path) -> bool,
{
    if !dir.is_dir() {
        eprintln!("No such path found at collect_files: {}", dir.display());
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| keep(p))
        .collect()
}

/// True when the path's extension (case-insensitive) is one of `exts`.
pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            exts.iter().any(|x| *x == e)
        })
        .unwrap_or(false)
}

/// Map of `{ file stem → absolute path }` for files with `ext` directly in
/// `dir` (not nested). Missing directory or zero matches degrade to an
/// empty map with a diagnostic.
pub fn files_entries(dir: &Path, ext: &str) -> BTreeMap<String, PathBuf> {
    let mut entries = BTreeMap::new();
    let suffix = if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    };

    if !dir.is_dir() {
        eprintln!("No such path found at files_entries: {}", dir.display());
        return entries;
    }

    let iter = match std::fs::read_dir(dir) {
        Ok(i) => i,
        Err(err) => {
            eprintln!("Error reading {}: {err}", dir.display());
            return entries;
        }
    };
    for item in iter.filter_map(|e| e.ok()) {
        let path = item.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file()
            && let Some(stem) = name.strip_suffix(&suffix)
        {
            entries.insert(stem.to_string(), path.clone());
        }
    }

    if entries.is_empty() {
        eprintln!(
            "at files_entries: no files found with {suffix} at {}",
            dir.display()
        );
    }
    entries
}

/// Delete each target that exists (files or whole trees).
pub fn clean_paths(targets: &[PathBuf]) -> io::Result<()> {
    for target in targets {
        if !check_access(target) {
            continue;
        }
        if target.is_dir() {
            std::fs::remove_dir_all(target)?;
        } else {
            std::fs::remove_file(target)?;
        }
    }
    Ok(())
}
