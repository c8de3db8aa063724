//! Filename classification engine.
//!
//! Turns a media file path into a [`Decision`]. Local pattern matching always
//! runs first; when the remote classifier is enabled its answer may refine the
//! series name and, only when local parsing found no numbering, the kind.
//! Classification never fails: anything inconclusive becomes
//! [`DecisionKind::Unknown`] and is quarantined by the planner.

use crate::config::{Config, ExtrasRule};
use crate::gateway::{ExternalClassifier, ExternalResult};
use crate::naming::{
    EXTRA_KEYWORDS, SPECIAL_KEYWORDS, choose_series_name, contains_keyword,
    extract_season_episode, has_explicit_numbering, normalize_series_title,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Bucket used for extras no configured keyword matched.
pub const DEFAULT_EXTRAS_BUCKET: &str = "other";

/// What a file turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Episode,
    Special,
    Extra,
    Ova,
    Movie,
    Unknown,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Episode => "episode",
            DecisionKind::Special => "special",
            DecisionKind::Extra => "extra",
            DecisionKind::Ova => "ova",
            DecisionKind::Movie => "movie",
            DecisionKind::Unknown => "unknown",
        }
    }

    /// Parses a kind name case-insensitively. Unrecognized names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "episode" => Some(DecisionKind::Episode),
            "special" => Some(DecisionKind::Special),
            "extra" => Some(DecisionKind::Extra),
            "ova" => Some(DecisionKind::Ova),
            "movie" => Some(DecisionKind::Movie),
            "unknown" => Some(DecisionKind::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured classification outcome for one file.
///
/// Fields that do not apply to `kind` are always `None`; build values through
/// the constructors rather than by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    pub series_name: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub extra_bucket: Option<String>,
    pub movie_title: Option<String>,
    pub movie_year: Option<u32>,
}

impl Decision {
    fn bare(kind: DecisionKind, series_name: String) -> Self {
        Self {
            kind,
            series_name,
            season: None,
            episode: None,
            extra_bucket: None,
            movie_title: None,
            movie_year: None,
        }
    }

    pub fn episode(series_name: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            season: Some(season),
            episode: Some(episode),
            ..Self::bare(DecisionKind::Episode, series_name.into())
        }
    }

    pub fn special(series_name: impl Into<String>) -> Self {
        Self::bare(DecisionKind::Special, series_name.into())
    }

    pub fn extra(series_name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            extra_bucket: Some(bucket.into()),
            ..Self::bare(DecisionKind::Extra, series_name.into())
        }
    }

    pub fn ova(series_name: impl Into<String>, number: u32) -> Self {
        Self {
            episode: Some(number),
            ..Self::bare(DecisionKind::Ova, series_name.into())
        }
    }

    pub fn movie(series_name: impl Into<String>, title: impl Into<String>, year: u32) -> Self {
        Self {
            movie_title: Some(title.into()),
            movie_year: Some(year),
            ..Self::bare(DecisionKind::Movie, series_name.into())
        }
    }

    pub fn unknown(series_name: impl Into<String>) -> Self {
        Self::bare(DecisionKind::Unknown, series_name.into())
    }

    /// Same decision under a different series name.
    pub fn with_series_name(&self, series_name: impl Into<String>) -> Self {
        Self {
            series_name: series_name.into(),
            ..self.clone()
        }
    }
}

/// Classifies one file.
///
/// `external` is consulted only when `config.classifier.enabled` is set. Any
/// error it returns leaves the locally derived decision untouched.
pub fn classify(
    path: &Path,
    config: &Config,
    external: Option<&mut dyn ExternalClassifier>,
) -> Decision {
    let raw_series = folder_series_hint(path);
    let series_name = choose_series_name(&raw_series, &config.series.overrides);
    let local = classify_locally(path, config, series_name);

    if !config.classifier.enabled {
        return local;
    }
    let Some(external) = external else {
        return local;
    };

    match external.classify_remote(path) {
        Ok(result) => reconcile(local, result, path, config, &raw_series),
        Err(e) => {
            debug!(file = %path.display(), "remote classification unavailable: {e}");
            local
        }
    }
}

/// The raw series hint: the name of the file's parent directory.
pub fn folder_series_hint(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Classifies from the filename alone.
pub fn classify_locally(path: &Path, config: &Config, series_name: String) -> Decision {
    let filename = file_name(path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match local_kind(&filename, &stem) {
        DecisionKind::Special => Decision::special(series_name),
        DecisionKind::Extra => {
            Decision::extra(series_name, extras_bucket(&filename, &config.rules.extras))
        }
        _ => match extract_season_episode(&stem, config.rules.default_season) {
            Some((season, episode)) => Decision::episode(series_name, season, episode),
            None => Decision::unknown(series_name),
        },
    }
}

// Explicit numbering beats any keyword: a series called "OPUS" must not end
// up in extras.
fn local_kind(filename: &str, stem: &str) -> DecisionKind {
    if has_explicit_numbering(stem) {
        DecisionKind::Episode
    } else if contains_keyword(filename, &SPECIAL_KEYWORDS) {
        DecisionKind::Special
    } else if contains_keyword(filename, &EXTRA_KEYWORDS) {
        DecisionKind::Extra
    } else {
        DecisionKind::Episode
    }
}

/// First configured bucket whose keyword appears in the filename.
pub fn extras_bucket(filename: &str, rules: &[ExtrasRule]) -> String {
    let upper = filename.to_uppercase();
    rules
        .iter()
        .find(|rule| upper.contains(&rule.keyword.to_uppercase()))
        .map(|rule| rule.bucket.clone())
        .unwrap_or_else(|| DEFAULT_EXTRAS_BUCKET.to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Merges a remote answer into the local decision.
///
/// The remote side may always improve the series name. It only decides the
/// kind and numbering when local parsing came up empty.
fn reconcile(
    local: Decision,
    external: ExternalResult,
    path: &Path,
    config: &Config,
    raw_series: &str,
) -> Decision {
    let series_source = external
        .series
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(raw_series);
    let series = choose_series_name(series_source, &config.series.overrides);
    let external_kind = external
        .kind
        .as_deref()
        .and_then(DecisionKind::parse)
        .unwrap_or(DecisionKind::Unknown);

    if external_kind == DecisionKind::Unknown
        || matches!(
            local.kind,
            DecisionKind::Episode | DecisionKind::Extra | DecisionKind::Special
        )
    {
        return local.with_series_name(series);
    }

    match external_kind {
        DecisionKind::Ova => match external.episode {
            Some(number) => Decision::ova(series, number),
            None => Decision::unknown(series),
        },
        DecisionKind::Movie => {
            let title = normalize_series_title(external.title.as_deref().unwrap_or_default());
            match external.year {
                Some(year) if !title.is_empty() => Decision::movie(series, title, year),
                _ => Decision::unknown(series),
            }
        }
        DecisionKind::Episode => match external.episode {
            Some(episode) => Decision::episode(
                series,
                external.season.unwrap_or(config.rules.default_season),
                episode,
            ),
            None => Decision::unknown(series),
        },
        DecisionKind::Extra => {
            let bucket = external
                .extra_bucket
                .as_deref()
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| extras_bucket(&file_name(path), &config.rules.extras));
            Decision::extra(series, bucket)
        }
        DecisionKind::Special => Decision::special(series),
        DecisionKind::Unknown => local.with_series_name(series),
    }
}
