use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::models::{parse_exception_entries, ExceptionEntry, ExceptionKind, ExceptionsDocument};

/// Entries of an exception file. Missing or malformed files read as empty.
pub fn read_exceptions(path: &Path) -> Vec<ExceptionEntry> {
    if !path.exists() {
        debug!("Exception file not found: {}", path.display());
        return Vec::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Error loading exceptions from {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match parse_exception_entries(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error loading exceptions from {}: {:#}", path.display(), e);
            Vec::new()
        }
    }
}

/// Rewrite an exception file, sorted by name
pub fn write_exceptions(path: &Path, kind: ExceptionKind, entries: Vec<ExceptionEntry>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let document = ExceptionsDocument::new(kind, entries);
    let mut content = serde_json::to_string_pretty(&document).context("Failed to serialize exceptions")?;
    content.push('\n');

    fs::write(path, content).with_context(|| format!("Failed to write exceptions file: {}", path.display()))?;

    info!("Saved {} exceptions to {}", document.exceptions.len(), path.display());
    Ok(())
}
