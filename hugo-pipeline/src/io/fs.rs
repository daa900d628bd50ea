//! Filesystem primitives used by the reconciler.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

pub fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

/// Write `contents` unless the file already holds exactly that. Returns whether it wrote.
pub fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if path.is_file() {
        let existing =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        if existing == contents {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))?;
    Ok(true)
}

/// True when `path` is a readable file containing `needle`. Missing files are `false`.
pub fn file_contains(path: &Path, needle: &str) -> Result<bool> {
    match read_optional(path)? {
        Some(contents) => Ok(contents.contains(needle)),
        None => Ok(false),
    }
}

pub fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(contents))
}

/// First file under `dir` with extension `ext` whose contents include `needle`.
///
/// A missing `dir` yields `None`. Files that are not valid UTF-8 are skipped.
pub fn find_file_containing(dir: &Path, ext: &str, needle: &str) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|e| e != ext) {
            continue;
        }
        match fs::read_to_string(path) {
            Ok(contents) if contents.contains(needle) => return Ok(Some(path.to_path_buf())),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                debug!(path = %path.display(), "skipping non-UTF-8 file");
            }
            Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
        }
    }
    Ok(None)
}

/// Recursively copy the visible top-level entries of `from` into `to`.
///
/// Mirrors `cp -r from/* to/`: hidden entries directly under `from` are
/// skipped, existing files in `to` are overwritten. Returns the number of
/// files copied.
pub fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    create_dir(to)?;
    let mut copied = 0usize;
    let walker = WalkDir::new(from)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() > 1 || !entry.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", from.display()))?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let target = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            create_dir(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("copy {} -> {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    Ok(copied)
}

/// Copy a single file, creating the destination's parent directory.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        create_dir(parent)?;
    }
    fs::copy(from, to)
        .with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
    Ok(())
}

pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        create_dir(parent)?;
    }
    fs::rename(from, to).with_context(|| format!("move {} -> {}", from.display(), to.display()))
}

pub fn remove_dir(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))
}
