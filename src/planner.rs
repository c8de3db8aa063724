//! Destination planning.
//!
//! Maps a [`Decision`] to the path a file should end up at. Planning is a pure
//! function of the decision, the configuration and the source path; it never
//! touches the filesystem and never fails.
//!
//! ```text
//! movie    <dest_root>/Movies/<Title> (<Year>)/<Title> (<Year>).<ext>
//! episode  <dest_root>/<Series>/Season NN/<Series> - SNNENN.<ext>
//! ova      <dest_root>/<Series>/OVA/<Series> - OVANN.<ext>
//! special  <dest_root>/<Series>/Season <specials>/<Series> - <stem>.<ext>
//! extra    <dest_root>/<Series>/<extras>/<bucket>/<Series> - <stem>.<ext>
//! other    <quarantine_dir>/<original filename>
//! ```

use crate::classifier::{DEFAULT_EXTRAS_BUCKET, Decision, DecisionKind};
use crate::config::Config;
use crate::naming::sanitize_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level folder for movies under the destination root.
pub const MOVIES_DIRNAME: &str = "Movies";

/// Per-series folder for OVAs.
pub const OVA_DIRNAME: &str = "OVA";

/// The only operation the executor knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Move,
}

/// A planned single-file relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub kind: OperationKind,
}

/// Plans where `source` goes according to `decision`.
pub fn plan(decision: &Decision, config: &Config, source: &Path) -> Operation {
    Operation {
        src: source.to_path_buf(),
        dst: destination(decision, config, source),
        kind: OperationKind::Move,
    }
}

fn destination(decision: &Decision, config: &Config, source: &Path) -> PathBuf {
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let (DecisionKind::Movie, Some(title), Some(year)) =
        (decision.kind, &decision.movie_title, decision.movie_year)
    {
        let label = format!("{} ({year})", sanitize_name(title));
        return config
            .paths
            .dest_root
            .join(MOVIES_DIRNAME)
            .join(&label)
            .join(format!("{label}{ext}"));
    }

    let Some(series) = path_segment(&decision.series_name) else {
        return quarantine_path(config, source);
    };
    let series_dir = config.paths.dest_root.join(&series);

    match (decision.kind, decision.season, decision.episode) {
        (DecisionKind::Episode, Some(season), Some(episode)) => series_dir
            .join(season_dirname(season))
            .join(format!("{series} - S{season:02}E{episode:02}{ext}")),
        (DecisionKind::Ova, _, number) => series_dir.join(OVA_DIRNAME).join(format!(
            "{series} - OVA{:02}{ext}",
            number.unwrap_or(1)
        )),
        (DecisionKind::Special, _, _) => series_dir
            .join(season_dirname(config.rules.specials_season))
            .join(format!("{series} - {}{ext}", sanitize_name(&stem))),
        (DecisionKind::Extra, _, _) => {
            let bucket = decision
                .extra_bucket
                .as_deref()
                .and_then(path_segment)
                .unwrap_or_else(|| DEFAULT_EXTRAS_BUCKET.to_string());
            series_dir
                .join(sanitize_name(&config.rules.extras_dirname))
                .join(bucket)
                .join(format!("{series} - {}{ext}", sanitize_name(&stem)))
        }
        _ => quarantine_path(config, source),
    }
}

// Sanitized name usable as a single folder; "." and ".." would leave the parent.
fn path_segment(name: &str) -> Option<String> {
    let name = sanitize_name(name);
    (!matches!(name.as_str(), "" | "." | "..")).then_some(name)
}

/// `Season NN`, zero-padded to two digits.
pub fn season_dirname(season: u32) -> String {
    format!("Season {season:02}")
}

fn quarantine_path(config: &Config, source: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => config.paths.quarantine_dir.join(name),
        None => config.paths.quarantine_dir.clone(),
    }
}
