//! Output formatting and styling module.
//!
//! All user-facing CLI output goes through [`OutputFormatter`] so colors,
//! symbols and the summary layout stay consistent across commands.
//! Diagnostics go through `tracing` instead.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Progress bars for moves
/// - Per-kind summary tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mediashelf::output::OutputFormatter;
    /// OutputFormatter::success("Rollback complete.");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, on stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// One planned move as `[kind] src -> dst`.
    pub fn planned_move(kind: &str, src: &str, dst: &str) {
        println!("[{}] {} {} {}", kind.cyan(), src, "->".dimmed(), dst);
    }

    /// Creates a progress bar for `total` moves.
    ///
    /// ```no_run
    /// use mediashelf::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(3);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        match ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            Ok(style) => pb.set_style(style.progress_chars("█▓░")),
            Err(e) => tracing::debug!("falling back to default progress style: {e}"),
        }
        pb
    }

    /// Prints a summary table of file counts per decision kind.
    ///
    /// ```no_run
    /// use mediashelf::output::OutputFormatter;
    /// use std::collections::BTreeMap;
    ///
    /// let mut counts = BTreeMap::new();
    /// counts.insert("episode".to_string(), 12);
    /// counts.insert("unknown".to_string(), 1);
    /// OutputFormatter::summary_table(&counts, 13);
    /// ```
    pub fn summary_table(kind_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = kind_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(5); // "Total"

        println!(
            "{:<width$} | {}",
            "Kind".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));

        for (kind, count) in kind_counts {
            println!(
                "{:<width$} | {} {}",
                kind,
                count.to_string().green(),
                file_word(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            file_word(total_files),
            width = width
        );
    }

    /// Prints the notice that closes a scan.
    pub fn preview_notice(message: &str) {
        println!("{}", format!("[SCAN] {}", message).yellow());
    }
}

fn file_word(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
