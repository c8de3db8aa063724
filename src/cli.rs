//! Command-line interface module for mediashelf.
//!
//! This module handles:
//! - Argument parsing (`clap` derive)
//! - Classification and planning of the inbox
//! - Apply orchestration: moves, log, status files and cleanup
//! - Rollback reporting

use crate::classifier::{Decision, classify};
use crate::config::Config;
use crate::executor::{ApplyFailure, MoveExecutor, OperationLog, reclaim_empty_directories};
use crate::gateway::{ClassifierGateway, ExternalClassifier};
use crate::output::OutputFormatter;
use crate::planner::{self, Operation};
use crate::remote::PerplexityClient;
use crate::scanner::list_media_files;
use crate::status::{FileStatus, build_rows, write_status_files};
use crate::undo::UndoManager;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(
    name = "mediashelf",
    version,
    about = "Classify downloaded anime and file it into a media-server library"
)]
pub struct Cli {
    /// Configuration file (defaults to .mediashelf.toml, then ~/.config/mediashelf/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Preview where every inbox file would go; nothing is moved
    Scan,
    /// Move every inbox file into the library and record the run
    Apply {
        /// Where to write the move log
        #[arg(long, default_value = "run-log.jsonl")]
        log: PathBuf,
        /// Base path for <status>.json and <status>.csv
        #[arg(long, default_value = "status")]
        status: PathBuf,
        /// Keep empty inbox folders after moving
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Undo a previous apply run from its move log
    Rollback {
        #[arg(long, default_value = "run-log.jsonl")]
        log: PathBuf,
    },
}

/// Runs one command.
///
/// Configuration is only loaded for `scan` and `apply`; `rollback` needs
/// nothing but the log.
///
/// # Examples
///
/// ```no_run
/// use mediashelf::cli::{Command, run_cli};
///
/// if let Err(e) = run_cli(Command::Scan, None) {
///     eprintln!("Error: {e:#}");
/// }
/// ```
pub fn run_cli(command: Command, config_path: Option<&Path>) -> Result<()> {
    match command {
        Command::Scan => scan(&load_config(config_path)?),
        Command::Apply {
            log,
            status,
            no_cleanup,
        } => apply(&load_config(config_path)?, &log, &status, !no_cleanup),
        Command::Rollback { log } => rollback(&log),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load(config_path).context("Error loading configuration")
}

/// Classifies and plans every file, sharing one gateway across the batch so
/// the folder memory and call budget span the whole run.
pub fn classify_and_plan(config: &Config, files: &[PathBuf]) -> Vec<(Decision, Operation)> {
    let mut gateway = config.classifier.enabled.then(|| {
        ClassifierGateway::from_config(
            PerplexityClient::from_config(&config.classifier),
            &config.classifier,
        )
    });

    let planned = files
        .iter()
        .map(|path| {
            let external = gateway
                .as_mut()
                .map(|gateway| gateway as &mut dyn ExternalClassifier);
            let decision = classify(path, config, external);
            let operation = planner::plan(&decision, config, path);
            debug!(kind = %decision.kind, src = %path.display(), dst = %operation.dst.display(), "planned");
            (decision, operation)
        })
        .collect();

    if let Some(gateway) = &gateway {
        info!(budget = ?gateway.budget(), cached = gateway.cache().len(), "classifier gateway finished");
    }
    planned
}

fn scan(config: &Config) -> Result<()> {
    let files = list_media_files(config)?;
    OutputFormatter::info(&format!("Found {} media files.", files.len()));
    if files.is_empty() {
        OutputFormatter::warning(
            "No media files found. Check paths.inbox_dir and rules.allowed_ext.",
        );
        return Ok(());
    }

    let planned = classify_and_plan(config, &files);
    let mut kind_counts: BTreeMap<String, usize> = BTreeMap::new();
    for (decision, operation) in &planned {
        OutputFormatter::planned_move(
            decision.kind.as_str(),
            &operation.src.display().to_string(),
            &operation.dst.display().to_string(),
        );
        *kind_counts.entry(decision.kind.to_string()).or_insert(0) += 1;
    }

    OutputFormatter::summary_table(&kind_counts, planned.len());
    OutputFormatter::preview_notice("No files were moved.");
    Ok(())
}

fn apply(config: &Config, log_path: &Path, status_base: &Path, cleanup: bool) -> Result<()> {
    let files = list_media_files(config)?;
    OutputFormatter::info(&format!("Found {} media files.", files.len()));
    if files.is_empty() {
        OutputFormatter::warning("No media files found. Nothing to apply.");
        return Ok(());
    }

    let planned = classify_and_plan(config, &files);
    let operations: Vec<Operation> = planned.iter().map(|(_, op)| op.clone()).collect();

    let pb = OutputFormatter::create_progress_bar(operations.len() as u64);
    let outcome = MoveExecutor::apply_with(&operations, |_| pb.inc(1));
    pb.finish_and_clear();

    // A partial batch is still logged so it can be rolled back.
    let (records, failure) = match outcome {
        Ok(records) => (records, None),
        Err(ApplyFailure { completed, source }) => (completed, Some(source)),
    };

    let log = OperationLog::new(records);
    log.save(log_path)?;
    OutputFormatter::success(&format!("Wrote log: {}", log_path.display()));

    let rows = build_rows(&planned, &log.records, &config.paths.quarantine_dir);
    let (json_path, csv_path) = write_status_files(status_base, &rows)?;

    let moved = rows.iter().filter(|r| r.status == FileStatus::Moved).count();
    let quarantined: Vec<&str> = rows
        .iter()
        .filter(|r| r.status == FileStatus::Quarantined)
        .filter_map(|r| Path::new(&r.dst).file_name()?.to_str())
        .collect();

    OutputFormatter::plain(&format!("Moved: {}", moved));
    OutputFormatter::plain(&format!("Quarantined: {}", quarantined.len()));
    OutputFormatter::plain(&format!(
        "Wrote status: {} and {}",
        json_path.display(),
        csv_path.display()
    ));
    if !quarantined.is_empty() {
        OutputFormatter::header("Quarantine files:");
        for name in &quarantined {
            OutputFormatter::plain(&format!("- {}", name));
        }
    }

    if let Some(source) = failure {
        return Err(anyhow::Error::new(source).context(format!(
            "Apply stopped after {} of {} moves; roll back with the log at {}",
            log.records.len(),
            operations.len(),
            log_path.display()
        )));
    }

    if cleanup {
        let removed = reclaim_empty_directories(&config.paths.inbox_dir);
        OutputFormatter::plain(&format!("Deleted empty inbox folders: {}", removed));
    }

    Ok(())
}

fn rollback(log_path: &Path) -> Result<()> {
    OutputFormatter::info(&format!("Rolling back {}...", log_path.display()));

    let report = UndoManager::rollback(log_path)
        .with_context(|| format!("Cannot roll back from {}", log_path.display()))?;

    OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));
    for backup in &report.backed_up_files {
        OutputFormatter::warning(&format!(
            "Existing file moved aside to {}",
            backup.display()
        ));
    }
    if !report.skipped_files.is_empty() {
        OutputFormatter::plain(&format!("  Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if !report.is_success() {
        OutputFormatter::plain(&format!("  Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    {}: {}", path.display(), reason));
        }
        bail!(
            "{} of {} file(s) could not be restored",
            report.failed_restores.len(),
            report.total_processed()
        );
    }

    OutputFormatter::success("Rollback complete.");
    Ok(())
}
