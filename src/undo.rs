/// Rollback of a previous apply run.
///
/// This module replays an operation log backwards, moving every file that is
/// still at its logged destination back to its logged source.
use crate::executor::{ExecutorResult, LogRecord, OperationLog, move_file};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Represents the result of a rollback.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files moved back to their source.
    pub restored_files: usize,
    /// Files already present at a source path, renamed aside before restoring.
    pub backed_up_files: Vec<PathBuf>,
    /// Records whose destination no longer exists.
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Records that could not be restored.
    pub failed_restores: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if nothing failed. Skipped records do not count as failures.
    pub fn is_success(&self) -> bool {
        self.failed_restores.is_empty()
    }
}

/// Manages rollback of apply runs.
pub struct UndoManager;

impl UndoManager {
    /// Rolls back the run recorded in `log_path`.
    ///
    /// An unreadable or corrupt log is an error; nothing is moved in that case.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mediashelf::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::rollback(Path::new("run-log.jsonl")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Rollback failed: {}", e),
    /// }
    /// ```
    pub fn rollback(log_path: &Path) -> ExecutorResult<UndoReport> {
        let log = OperationLog::load(log_path)?;
        Ok(Self::rollback_records(&log.records))
    }

    /// Replays `records` in reverse order (undo is LIFO).
    pub fn rollback_records(records: &[LogRecord]) -> UndoReport {
        let mut report = UndoReport::default();
        for record in records.iter().rev() {
            let src = PathBuf::from(&record.src);
            let dst = PathBuf::from(&record.dst);

            if !dst.exists() {
                warn!(dst = %dst.display(), "rollback skipped, destination missing");
                report
                    .skipped_files
                    .push((dst, "File not found at logged destination".to_string()));
                continue;
            }

            match Self::restore_file(&src, &dst) {
                Ok(backup) => {
                    info!(src = %src.display(), dst = %dst.display(), "restored");
                    report.restored_files += 1;
                    report.backed_up_files.extend(backup);
                }
                Err(reason) => report.failed_restores.push((dst, reason)),
            }
        }
        report
    }

    /// Moves `dst` back to `src`. A file already at `src` is renamed aside
    /// first and its new path returned.
    fn restore_file(src: &Path, dst: &Path) -> Result<Option<PathBuf>, String> {
        if let Some(parent) = src.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Could not recreate {}: {}", parent.display(), e))?;
        }

        let backup = if src.exists() {
            let backup_path = Self::generate_backup_path(src);
            fs::rename(src, &backup_path)
                .map_err(|e| format!("Could not backup conflicting file: {}", e))?;
            Some(backup_path)
        } else {
            None
        };

        move_file(dst, src).map_err(|e| e.to_string())?;
        Ok(backup)
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.mkv` becomes `file.mkv.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());

        original_path.with_file_name(format!("{}.bak.{}", filename, timestamp))
    }
}
