/// Move execution, the operation log and empty-directory reclamation.
///
/// This module performs the planned relocations: it creates destination
/// folders, renames around collisions with a `__dupN` suffix, moves each file
/// and records where it actually landed. The resulting log is written as
/// newline-delimited JSON so a run can be rolled back later.
use crate::planner::Operation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Highest `__dupN` suffix tried before giving up on a destination.
pub const MAX_COLLISION_SUFFIX: u32 = 999;

/// The only action recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Move,
}

/// One performed move. `dst` is the final path after collision handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub action: LogAction,
    pub src: String,
    pub dst: String,
}

impl LogRecord {
    pub fn moved(src: &Path, dst: &Path) -> Self {
        Self {
            action: LogAction::Move,
            src: src.to_string_lossy().into_owned(),
            dst: dst.to_string_lossy().into_owned(),
        }
    }
}

/// Errors that can occur while moving files or handling the log.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Failed to create a destination directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
    /// Failed to move a file to its destination.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// Every `__dupN` candidate up to the bound already exists.
    #[error("No free name for {} after {attempts} attempts", .path.display())]
    CollisionSearchExhausted { path: PathBuf, attempts: u32 },
    /// Failed to write the operation log.
    #[error("Failed to write operation log {}: {source}", .path.display())]
    LogWriteFailed { path: PathBuf, source: io::Error },
    /// Failed to read the operation log.
    #[error("Failed to read operation log {}: {source}", .path.display())]
    LogReadFailed { path: PathBuf, source: io::Error },
    /// A log line is not a valid record.
    #[error("Invalid operation log {} at line {line}: {reason}", .path.display())]
    InvalidLogFormat {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// A batch that stopped early. `completed` holds the moves already performed,
/// which are not undone automatically.
#[derive(Debug, Error)]
#[error("{source} ({} file(s) moved before the failure)", .completed.len())]
pub struct ApplyFailure {
    pub completed: Vec<LogRecord>,
    pub source: ExecutorError,
}

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// The ordered log of one apply run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationLog {
    pub records: Vec<LogRecord>,
}

impl OperationLog {
    pub fn new(records: Vec<LogRecord>) -> Self {
        Self { records }
    }

    /// Writes every record as one JSON line, replacing any previous file.
    pub fn save(&self, log_path: &Path) -> ExecutorResult<()> {
        let to_error = |source| ExecutorError::LogWriteFailed {
            path: log_path.to_path_buf(),
            source,
        };

        let mut content = String::new();
        for record in &self.records {
            let line = serde_json::to_string(record)
                .map_err(|e| to_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
            content.push_str(&line);
            content.push('\n');
        }

        if let Some(parent) = log_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(to_error)?;
        }
        fs::write(log_path, content).map_err(to_error)
    }

    /// Reads a log, skipping blank lines. Any malformed line is fatal.
    pub fn load(log_path: &Path) -> ExecutorResult<Self> {
        let content =
            fs::read_to_string(log_path).map_err(|source| ExecutorError::LogReadFailed {
                path: log_path.to_path_buf(),
                source,
            })?;

        let records = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<LogRecord>(line).map_err(|e| {
                    ExecutorError::InvalidLogFormat {
                        path: log_path.to_path_buf(),
                        line: index + 1,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }
}

/// Performs planned moves.
pub struct MoveExecutor;

impl MoveExecutor {
    /// Applies every operation in order and returns the log of performed moves.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mediashelf::executor::MoveExecutor;
    /// use mediashelf::planner::{Operation, OperationKind};
    /// use std::path::PathBuf;
    ///
    /// let ops = vec![Operation {
    ///     src: PathBuf::from("/inbox/Show/Show - 01.mkv"),
    ///     dst: PathBuf::from("/library/Show/Season 01/Show - S01E01.mkv"),
    ///     kind: OperationKind::Move,
    /// }];
    /// match MoveExecutor::apply(&ops) {
    ///     Ok(records) => println!("moved {} file(s)", records.len()),
    ///     Err(failure) => eprintln!("stopped: {failure}"),
    /// }
    /// ```
    pub fn apply(operations: &[Operation]) -> Result<Vec<LogRecord>, ApplyFailure> {
        Self::apply_with(operations, |_| {})
    }

    /// Like [`MoveExecutor::apply`], calling `on_moved` after each move.
    pub fn apply_with<F>(
        operations: &[Operation],
        mut on_moved: F,
    ) -> Result<Vec<LogRecord>, ApplyFailure>
    where
        F: FnMut(&LogRecord),
    {
        let mut completed = Vec::with_capacity(operations.len());
        for operation in operations {
            match Self::execute(operation) {
                Ok(record) => {
                    on_moved(&record);
                    completed.push(record);
                }
                Err(source) => return Err(ApplyFailure { completed, source }),
            }
        }
        Ok(completed)
    }

    /// Moves a single file, never overwriting an existing destination.
    pub fn execute(operation: &Operation) -> ExecutorResult<LogRecord> {
        if let Some(parent) = operation.dst.parent() {
            fs::create_dir_all(parent).map_err(|source| {
                ExecutorError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source,
                }
            })?;
        }

        let final_dst = unique_destination(&operation.dst)?;
        move_file(&operation.src, &final_dst)?;
        info!(src = %operation.src.display(), dst = %final_dst.display(), "moved");

        Ok(LogRecord::moved(&operation.src, &final_dst))
    }
}

/// `dst` itself if free, otherwise the first free `<stem>__dupN<ext>`.
pub fn unique_destination(dst: &Path) -> ExecutorResult<PathBuf> {
    if !dst.exists() {
        return Ok(dst.to_path_buf());
    }

    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dst
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_COLLISION_SUFFIX)
        .map(|n| dst.with_file_name(format!("{stem}__dup{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| ExecutorError::CollisionSearchExhausted {
            path: dst.to_path_buf(),
            attempts: MAX_COLLISION_SUFFIX,
        })
}

/// Renames `from` to `to`, copying across filesystems when rename cannot.
pub fn move_file(from: &Path, to: &Path) -> ExecutorResult<()> {
    let to_error = |source| ExecutorError::FileMoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(to_error)?;
            fs::remove_file(from).map_err(to_error)
        }
        Err(e) => Err(to_error(e)),
    }
}

/// Removes every empty directory below `root`, deepest first.
///
/// A directory whose only contents were empty subdirectories is removed in
/// the same pass. `root` itself is kept. Returns the number removed.
pub fn reclaim_empty_directories(root: &Path) -> usize {
    let mut removed = 0;
    let directories = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir());

    for entry in directories {
        let is_empty = fs::read_dir(entry.path())
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty {
            continue;
        }
        match fs::remove_dir(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => warn!(dir = %entry.path().display(), "could not remove empty directory: {e}"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::OperationKind;
    use tempfile::TempDir;

    fn operation(src: PathBuf, dst: PathBuf) -> Operation {
        Operation {
            src,
            dst,
            kind: OperationKind::Move,
        }
    }

    #[test]
    fn test_apply_creates_parents_and_logs_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("inbox").join("a.mkv");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, "a").unwrap();
        let dst = temp_dir.path().join("library/Show/Season 01/Show - S01E01.mkv");

        let records = MoveExecutor::apply(&[operation(src.clone(), dst.clone())])
            .expect("apply should succeed");

        assert!(!src.exists());
        assert!(dst.exists());
        assert_eq!(records, vec![LogRecord::moved(&src, &dst)]);
    }

    #[test]
    fn test_collision_never_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("new.mkv");
        let dst = temp_dir.path().join("lib").join("Show - S01E01.mkv");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, "existing").unwrap();
        fs::write(&src, "incoming").unwrap();

        let records = MoveExecutor::apply(&[operation(src, dst.clone())]).unwrap();

        let dup = temp_dir.path().join("lib").join("Show - S01E01__dup1.mkv");
        assert_eq!(fs::read_to_string(&dst).unwrap(), "existing");
        assert_eq!(fs::read_to_string(&dup).unwrap(), "incoming");
        assert_eq!(records[0].dst, dup.to_string_lossy());
    }

    #[test]
    fn test_unique_destination_counts_up() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dst = temp_dir.path().join("x.mkv");
        fs::write(&dst, "").unwrap();
        fs::write(temp_dir.path().join("x__dup1.mkv"), "").unwrap();

        assert_eq!(
            unique_destination(&dst).unwrap(),
            temp_dir.path().join("x__dup2.mkv")
        );
        assert_eq!(
            unique_destination(&temp_dir.path().join("free.mkv")).unwrap(),
            temp_dir.path().join("free.mkv")
        );
    }

    #[test]
    fn test_apply_stops_and_reports_completed_moves() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let first = temp_dir.path().join("first.mkv");
        fs::write(&first, "1").unwrap();
        let missing = temp_dir.path().join("missing.mkv");

        let ops = vec![
            operation(first.clone(), temp_dir.path().join("out/first.mkv")),
            operation(missing, temp_dir.path().join("out/missing.mkv")),
        ];
        let failure = MoveExecutor::apply(&ops).expect_err("second move must fail");

        assert_eq!(failure.completed.len(), 1);
        assert!(matches!(failure.source, ExecutorError::FileMoveFailure { .. }));
    }

    #[test]
    fn test_log_round_trip_tolerates_blank_lines() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("logs").join("run-log.jsonl");
        let log = OperationLog::new(vec![
            LogRecord::moved(Path::new("/in/a.mkv"), Path::new("/out/a.mkv")),
            LogRecord::moved(Path::new("/in/b.mkv"), Path::new("/out/b__dup1.mkv")),
        ]);
        log.save(&log_path).unwrap();

        let mut content = fs::read_to_string(&log_path).unwrap();
        assert!(content.starts_with(r#"{"action":"move","src":"/in/a.mkv","dst":"/out/a.mkv"}"#));
        content.push_str("\n\n");
        fs::write(&log_path, content).unwrap();

        assert_eq!(OperationLog::load(&log_path).unwrap(), log);
    }

    #[test]
    fn test_corrupt_log_is_fatal() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let log_path = temp_dir.path().join("run-log.jsonl");
        fs::write(&log_path, "{\"action\":\"move\",\"src\":\"a\",\"dst\":\"b\"}\n{oops\n").unwrap();

        match OperationLog::load(&log_path) {
            Err(ExecutorError::InvalidLogFormat { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected invalid log, got {other:?}"),
        }
        assert!(matches!(
            OperationLog::load(&temp_dir.path().join("absent.jsonl")),
            Err(ExecutorError::LogReadFailed { .. })
        ));
    }

    #[test]
    fn test_reclaim_removes_nested_empty_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("keep/empty")).unwrap();
        fs::write(root.join("keep/file.txt"), "x").unwrap();

        let removed = reclaim_empty_directories(root);

        assert_eq!(removed, 4);
        assert!(!root.join("a").exists());
        assert!(root.join("keep/file.txt").exists());
        assert!(!root.join("keep/empty").exists());
        assert!(root.exists());
    }

    #[test]
    fn test_reclaim_missing_root_is_zero() {
        assert_eq!(reclaim_empty_directories(Path::new("/non/existent/root")), 0);
    }
}
