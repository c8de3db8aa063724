//! Status report written after an apply run: `<base>.json` and `<base>.csv`.

use crate::classifier::{Decision, DecisionKind};
use crate::executor::LogRecord;
use crate::planner::Operation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing status files.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode status JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write status CSV {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
}

/// What happened to one planned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileStatus {
    Planned,
    Moved,
    Quarantined,
}

/// One row of the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRow {
    pub src: String,
    pub dst: String,
    pub decision_kind: DecisionKind,
    pub status: FileStatus,
}

/// Builds one row per planned file.
///
/// Files found in `records` are `MOVED` (or `QUARANTINED` when their final
/// destination lies under `quarantine_dir`) and report the actual destination.
/// Files the batch never reached stay `PLANNED`.
pub fn build_rows(
    planned: &[(Decision, Operation)],
    records: &[LogRecord],
    quarantine_dir: &Path,
) -> Vec<StatusRow> {
    let moved: HashMap<&str, &str> = records
        .iter()
        .map(|record| (record.src.as_str(), record.dst.as_str()))
        .collect();

    planned
        .iter()
        .map(|(decision, operation)| {
            let src = operation.src.to_string_lossy().into_owned();
            match moved.get(src.as_str()) {
                Some(&dst) => StatusRow {
                    status: if Path::new(dst).starts_with(quarantine_dir) {
                        FileStatus::Quarantined
                    } else {
                        FileStatus::Moved
                    },
                    dst: dst.to_string(),
                    src,
                    decision_kind: decision.kind,
                },
                None => StatusRow {
                    dst: operation.dst.to_string_lossy().into_owned(),
                    src,
                    decision_kind: decision.kind,
                    status: FileStatus::Planned,
                },
            }
        })
        .collect()
}

/// Writes `<base>.json` (pretty array) and `<base>.csv` (with header).
/// Returns both paths.
pub fn write_status_files(base: &Path, rows: &[StatusRow]) -> Result<(PathBuf, PathBuf), StatusError> {
    let json_path = base.with_extension("json");
    let csv_path = base.with_extension("csv");

    if let Some(parent) = json_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| StatusError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(rows)?;
    fs::write(&json_path, json).map_err(|source| StatusError::Io {
        path: json_path.clone(),
        source,
    })?;

    let csv_error = |source| StatusError::Csv {
        path: csv_path.clone(),
        source,
    };
    let mut writer = csv::Writer::from_path(&csv_path).map_err(csv_error)?;
    if rows.is_empty() {
        writer
            .write_record(["src", "dst", "decision_kind", "status"])
            .map_err(csv_error)?;
    }
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|source| StatusError::Io {
            path: csv_path.clone(),
            source,
        })?;

    Ok((json_path, csv_path))
}
