//! Inbox enumeration.

use crate::config::{Config, ConfigError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Errors that can occur while scanning the inbox.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Inbox directory not found: {}", .0.display())]
    InboxMissing(PathBuf),
    #[error(transparent)]
    Filters(#[from] ConfigError),
}

/// Lists every media file below `inbox_dir`, sorted by lower-cased path.
///
/// Only regular files whose extension is in `rules.allowed_ext` and that
/// pass the configured filter rules are returned. Unreadable entries are
/// logged and skipped.
pub fn list_media_files(config: &Config) -> Result<Vec<PathBuf>, ScanError> {
    let inbox = &config.paths.inbox_dir;
    if !inbox.is_dir() {
        return Err(ScanError::InboxMissing(inbox.clone()));
    }

    let allowed = config.allowed_extensions();
    let filters = config.filters.compile()?;

    let mut files: Vec<PathBuf> = WalkDir::new(inbox)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", inbox.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_allowed_extension(path, &allowed))
        .filter(|path| {
            let keep = filters.should_include(path);
            if !keep {
                debug!(path = %path.display(), "excluded by filter rules");
            }
            keep
        })
        .collect();

    files.sort_by_cached_key(|path| path.to_string_lossy().to_lowercase());
    Ok(files)
}

fn has_allowed_extension(path: &Path, allowed: &std::collections::HashSet<String>) -> bool {
    path.extension()
        .map(|ext| allowed.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}
