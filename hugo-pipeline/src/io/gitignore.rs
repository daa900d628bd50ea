//! Project `.gitignore` registrar.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Append each pattern that is not yet a line of the ignore file.
///
/// Existing content and order are kept. Returns the patterns that were added.
pub fn ensure_patterns(path: &Path, patterns: &[String]) -> Result<Vec<String>> {
    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?
    } else {
        String::new()
    };

    let mut added = Vec::new();
    for pattern in patterns {
        let present = existing.lines().map(str::trim).any(|line| line == pattern)
            || added.contains(pattern);
        if !present {
            added.push(pattern.clone());
        }
    }

    if added.is_empty() {
        debug!(path = %path.display(), "ignore patterns already present");
        return Ok(added);
    }

    let mut out = existing;
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for pattern in &added {
        out.push_str(pattern);
        out.push('\n');
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, out).with_context(|| format!("write {}", path.display()))?;
    Ok(added)
}
