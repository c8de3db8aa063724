//! Boundary to the optional remote classifier.
//!
//! The gateway owns everything stateful about remote classification: the
//! persistent per-file cache, the run-scoped folder memory and the call
//! budget. Resolution is checked in order:
//!
//! 1. file fingerprint cache (`path|size|mtime`), no call made
//! 2. folder memory: another file in the same folder already produced a
//!    series name this run, so return that name with kind `unknown`
//! 3. a live call through [`RemoteClassifier`], gated by the budget
//!
//! A gateway is an ordinary value. Each run (or test) builds its own, so no
//! state leaks between runs.

use crate::config::ClassifierConfig;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Why the remote classifier could not produce a result.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("remote classifier disabled by max_calls = 0")]
    BudgetDisabled,
    #[error("remote classifier call limit reached ({limit})")]
    BudgetExhausted { limit: u64 },
    #[error("remote classifier credentials missing (classifier.api_key or PPLX_API_KEY)")]
    MissingCredentials,
    #[error("remote classifier request failed: {0}")]
    Transport(String),
    #[error("remote classifier returned an unusable reply: {0}")]
    MalformedResponse(String),
    #[error("cannot fingerprint {}: {source}", .path.display())]
    Fingerprint {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot append to classifier cache {}: {source}", .path.display())]
    CacheWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What the remote classifier said about one file.
///
/// Every field is optional; values of the wrong shape deserialize as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub series: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub episode: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub year: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub extra_bucket: Option<String>,
}

impl ExternalResult {
    /// Result handed out on a folder-memory hit: a series name, nothing else.
    pub fn series_only(series: impl Into<String>) -> Self {
        Self {
            kind: Some("unknown".to_string()),
            series: Some(series.into()),
            ..Self::default()
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// What is sent to the remote classifier for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationRequest {
    pub folder: String,
    pub filename: String,
    pub full_path: String,
}

impl ClassificationRequest {
    pub fn for_path(path: &Path) -> Self {
        Self {
            folder: path
                .parent()
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            full_path: path.to_string_lossy().into_owned(),
        }
    }
}

/// Transport seam: performs one live call and returns the raw reply text.
pub trait RemoteClassifier {
    fn complete(&self, request: &ClassificationRequest) -> Result<String, GatewayError>;
}

/// What the classification engine consumes.
pub trait ExternalClassifier {
    fn classify_remote(&mut self, path: &Path) -> Result<ExternalResult, GatewayError>;
}

/// How many live calls a run may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallBudget {
    Unlimited,
    Disabled,
    Limited { max: u64, used: u64 },
}

impl CallBudget {
    /// `None` or negative means unlimited, zero disables the gateway.
    pub fn from_max_calls(max_calls: Option<i64>) -> Self {
        match max_calls {
            Some(0) => Self::Disabled,
            Some(max) if max > 0 => Self::Limited {
                max: max.unsigned_abs(),
                used: 0,
            },
            _ => Self::Unlimited,
        }
    }

    /// Fails if another call is not allowed.
    pub fn check(&self) -> Result<(), GatewayError> {
        match *self {
            Self::Unlimited => Ok(()),
            Self::Disabled => Err(GatewayError::BudgetDisabled),
            Self::Limited { max, used } if used >= max => {
                Err(GatewayError::BudgetExhausted { limit: max })
            }
            Self::Limited { .. } => Ok(()),
        }
    }

    fn record_call(&mut self) {
        if let Self::Limited { used, .. } = self {
            *used += 1;
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    key: String,
    value: ExternalResult,
}

/// Append-only JSONL cache of remote results keyed by file fingerprint.
#[derive(Debug, Default)]
pub struct ClassificationCache {
    path: Option<PathBuf>,
    entries: HashMap<String, ExternalResult>,
}

impl ClassificationCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the cache file if it exists. Later records override earlier
    /// ones; unreadable lines are skipped.
    pub fn open(path: &Path) -> Self {
        let mut entries = HashMap::new();
        match fs::read_to_string(path) {
            Ok(content) => {
                for (index, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<CacheRecord>(line) {
                        Ok(record) => {
                            entries.insert(record.key, record.value);
                        }
                        Err(e) => warn!(
                            cache = %path.display(),
                            line = index + 1,
                            "skipping unreadable classifier cache line: {e}"
                        ),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(cache = %path.display(), "classifier cache unreadable: {e}"),
        }

        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ExternalResult> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a record to the file (if any) and updates the in-memory view.
    pub fn append(&mut self, key: String, value: ExternalResult) -> Result<(), GatewayError> {
        if let Some(path) = &self.path {
            let record = CacheRecord {
                key: key.clone(),
                value: value.clone(),
            };
            let line = serde_json::to_string(&record)
                .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
            let write = || -> std::io::Result<()> {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(file, "{line}")
            };
            write().map_err(|source| GatewayError::CacheWrite {
                path: path.clone(),
                source,
            })?;
        }
        self.entries.insert(key, value);
        Ok(())
    }
}

/// Cache key for a file: `<path>|<size>|<mtime seconds>`.
pub fn fingerprint(path: &Path) -> Result<String, GatewayError> {
    let to_error = |source| GatewayError::Fingerprint {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(to_error)?;
    let modified = metadata.modified().map_err(to_error)?;
    let mtime = chrono::DateTime::<chrono::Utc>::from(modified).timestamp();
    Ok(format!("{}|{}|{}", path.display(), metadata.len(), mtime))
}

fn folder_key(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
}

/// Parses a reply that should be a JSON object, tolerating surrounding prose.
pub fn parse_classifier_reply(text: &str) -> Result<ExternalResult, GatewayError> {
    let text = text.trim();
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(_) => {
            let span = text
                .find('{')
                .zip(text.rfind('}'))
                .filter(|(start, end)| end > start)
                .map(|(start, end)| &text[start..=end])
                .ok_or_else(|| {
                    GatewayError::MalformedResponse("reply contains no JSON object".to_string())
                })?;
            serde_json::from_str(span).map_err(|e| GatewayError::MalformedResponse(e.to_string()))?
        }
    };

    if !value.is_object() {
        return Err(GatewayError::MalformedResponse(
            "reply is not a JSON object".to_string(),
        ));
    }

    let mut result: ExternalResult = serde_json::from_value(value)
        .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
    result.extra_bucket = result
        .extra_bucket
        .map(|bucket| bucket.trim().to_lowercase())
        .filter(|bucket| !bucket.is_empty());
    Ok(result)
}

/// Run-scoped gateway: caches, folder memory and call budget around a transport.
pub struct ClassifierGateway<R> {
    remote: R,
    cache: ClassificationCache,
    folder_series: HashMap<PathBuf, String>,
    budget: CallBudget,
}

impl<R: RemoteClassifier> ClassifierGateway<R> {
    pub fn new(remote: R, cache: ClassificationCache, budget: CallBudget) -> Self {
        Self {
            remote,
            cache,
            folder_series: HashMap::new(),
            budget,
        }
    }

    /// Builds a gateway with the persistent cache and budget from configuration.
    pub fn from_config(remote: R, config: &ClassifierConfig) -> Self {
        Self::new(
            remote,
            ClassificationCache::open(&config.cache_path),
            CallBudget::from_max_calls(config.max_calls),
        )
    }

    pub fn budget(&self) -> CallBudget {
        self.budget
    }

    pub fn cache(&self) -> &ClassificationCache {
        &self.cache
    }

    /// Series name remembered for a folder during this run, if any.
    pub fn remembered_series(&self, folder: &Path) -> Option<&str> {
        self.folder_series.get(folder).map(String::as_str)
    }
}

impl<R: RemoteClassifier> ExternalClassifier for ClassifierGateway<R> {
    fn classify_remote(&mut self, path: &Path) -> Result<ExternalResult, GatewayError> {
        let key = fingerprint(path)?;
        if let Some(hit) = self.cache.get(&key) {
            debug!(file = %path.display(), "classifier cache hit");
            return Ok(hit.clone());
        }

        let folder = folder_key(path);
        if let Some(series) = self.folder_series.get(&folder) {
            debug!(file = %path.display(), series = %series, "reusing folder series");
            return Ok(ExternalResult::series_only(series.clone()));
        }

        self.budget.check()?;
        let raw = self.remote.complete(&ClassificationRequest::for_path(path))?;
        self.budget.record_call();

        let result = parse_classifier_reply(&raw)?;
        self.cache.append(key, result.clone())?;

        if let Some(series) = result.series.as_deref().map(str::trim)
            && !series.is_empty()
        {
            self.folder_series.insert(folder, series.to_string());
        }

        Ok(result)
    }
}
