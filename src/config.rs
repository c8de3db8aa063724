//! Configuration loading, defaults and validation.
//!
//! Configuration lives in a TOML file. Every key has a default so an empty
//! file (or no file at all) produces a usable configuration rooted in the
//! working directory.
//!
//! # Configuration File Format
//!
//! ```toml
//! [paths]
//! inbox_dir = "~/Downloads/anime"
//! dest_root = "/srv/media/anime"
//! quarantine_dir = "/srv/media/_quarantine"
//!
//! [rules]
//! default_season = 1
//! specials_season = 0
//! allowed_ext = ["mkv", "mp4"]
//! extras_dirname = "extras"
//!
//! [[rules.extras]]
//! keyword = "NCOP"
//! bucket = "creditless"
//!
//! [[series.overrides]]
//! match = "frieren"
//! name = "Frieren"
//!
//! [classifier]
//! enabled = true
//! max_calls = 50
//!
//! [filters.exclude]
//! patterns = ["*/sample/*"]
//! ```
//!
//! Extras rules and series overrides are ordered lists: the first matching
//! entry wins, so their order in the file matters.

use crate::naming::sanitize_name;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".mediashelf.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Invalid TOML syntax, structure, or a rejected value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    /// Invalid glob pattern in the filter rules.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern in the filter rules.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    Io(String),
}

/// Complete tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub filters: FilterRules,
}

/// Where files come from and where they go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: PathBuf,
    #[serde(default = "default_dest_root")]
    pub dest_root: PathBuf,
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            inbox_dir: default_inbox_dir(),
            dest_root: default_dest_root(),
            quarantine_dir: default_quarantine_dir(),
        }
    }
}

fn default_inbox_dir() -> PathBuf {
    PathBuf::from("inbox")
}

fn default_dest_root() -> PathBuf {
    PathBuf::from("library")
}

fn default_quarantine_dir() -> PathBuf {
    PathBuf::from("quarantine")
}

/// Classification and layout rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Season assumed when a filename only carries an episode number.
    #[serde(default = "default_season")]
    pub default_season: u32,
    /// Season folder that specials are filed under.
    #[serde(default)]
    pub specials_season: u32,
    /// Extensions considered media, without the leading dot.
    #[serde(default = "default_allowed_ext")]
    pub allowed_ext: Vec<String>,
    /// Name of the per-series folder holding extras.
    #[serde(default = "default_extras_dirname")]
    pub extras_dirname: String,
    /// Ordered keyword to bucket rules for extras.
    #[serde(default)]
    pub extras: Vec<ExtrasRule>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            default_season: default_season(),
            specials_season: 0,
            allowed_ext: default_allowed_ext(),
            extras_dirname: default_extras_dirname(),
            extras: Vec::new(),
        }
    }
}

fn default_season() -> u32 {
    1
}

fn default_allowed_ext() -> Vec<String> {
    vec!["mkv".to_string(), "mp4".to_string(), "avi".to_string()]
}

fn default_extras_dirname() -> String {
    "extras".to_string()
}

/// Maps a filename keyword (case-insensitive) to an extras bucket folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrasRule {
    pub keyword: String,
    pub bucket: String,
}

/// Series naming configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesConfig {
    #[serde(default)]
    pub overrides: Vec<SeriesOverride>,
}

/// Replaces a normalized series name containing `pattern` with `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOverride {
    #[serde(rename = "match")]
    pub pattern: String,
    pub name: String,
}

/// Settings for the optional remote classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bearer credential; `PPLX_API_KEY` is consulted when empty.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Absent or negative: unlimited. Zero: disabled. Positive: hard cap per run.
    #[serde(default)]
    pub max_calls: Option<i64>,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_calls: None,
            cache_path: default_cache_path(),
        }
    }
}

fn default_model() -> String {
    "sonar".to_string()
}

fn default_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("classifier-cache.jsonl")
}

/// Exclusion rules applied while scanning the inbox.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist, overrides exclude rules.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding inbox files from classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude.
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the full path (e.g. "*/sample/*").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions to exclude even if allowed (e.g. "part").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the filename.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Glob patterns that override exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Config {
    /// Load configuration, with fallback to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, when provided (must exist)
    /// 2. `.mediashelf.toml` in the current directory
    /// 3. `~/.config/mediashelf/config.toml`
    /// 4. Built-in defaults
    ///
    /// Paths in the result are home-expanded and absolute.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else if Path::new(LOCAL_CONFIG_FILE).exists() {
            Self::load_from_file(Path::new(LOCAL_CONFIG_FILE))?
        } else if let Some(home_config) = home_dir()
            .map(|home| home.join(".config").join("mediashelf").join("config.toml"))
            .filter(|path| path.exists())
        {
            Self::load_from_file(&home_config)?
        } else {
            Self::default()
        };

        let config = config.resolve_paths()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Expands `~` and makes every configured path absolute.
    pub fn resolve_paths(mut self) -> Result<Self, ConfigError> {
        self.paths.inbox_dir = absolute_path(&self.paths.inbox_dir)?;
        self.paths.dest_root = absolute_path(&self.paths.dest_root)?;
        self.paths.quarantine_dir = absolute_path(&self.paths.quarantine_dir)?;
        self.classifier.cache_path = absolute_path(&self.classifier.cache_path)?;
        Ok(self)
    }

    /// Rejects values that would make planning or scanning meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rules.allowed_ext.iter().all(|ext| normalize_extension(ext).is_empty()) {
            return Err(ConfigError::Invalid(
                "rules.allowed_ext must list at least one extension".to_string(),
            ));
        }
        if sanitize_name(&self.rules.extras_dirname).is_empty() {
            return Err(ConfigError::Invalid(
                "rules.extras_dirname must not be empty".to_string(),
            ));
        }
        if let Some(rule) = self.rules.extras.iter().find(|r| r.keyword.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "extras rule for bucket '{}' has an empty keyword",
                rule.bucket
            )));
        }
        if let Some(rule) = self
            .series
            .overrides
            .iter()
            .find(|r| r.pattern.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "series override '{}' has an empty match",
                rule.name
            )));
        }
        self.filters.compile().map(|_| ())
    }

    /// Allowed extensions, lower-cased and without leading dots.
    pub fn allowed_extensions(&self) -> HashSet<String> {
        self.rules
            .allowed_ext
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf, ConfigError> {
    std::path::absolute(expand_home(path)).map_err(|e| ConfigError::Io(e.to_string()))
}

/// Compiled filter rules for efficient matching during a scan.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl FilterRules {
    /// Compile the rules, validating every glob and regex.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = self
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledFilters {
            enable_hidden_files: self.enable_hidden_files,
            exclude_filenames: self.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: self
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&self.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&self.include.patterns)?,
        })
    }
}

impl CompiledFilters {
    /// Whether a scanned file should be classified.
    ///
    /// Include patterns win outright; otherwise hidden files, exact names,
    /// extensions, globs and regexes are checked in that order.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.rules.default_season, 1);
        assert_eq!(config.rules.specials_season, 0);
        assert_eq!(config.rules.extras_dirname, "extras");
        assert!(!config.classifier.enabled);
        assert_eq!(config.classifier.max_calls, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ordered_rules_preserve_file_order() {
        let config = Config::from_toml_str(
            r#"
            [[rules.extras]]
            keyword = "NCOP"
            bucket = "creditless"

            [[rules.extras]]
            keyword = "OP"
            bucket = "openings"

            [[series.overrides]]
            match = "frieren"
            name = "Frieren"
            "#,
        )
        .unwrap();

        let keywords: Vec<_> = config.rules.extras.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["NCOP", "OP"]);
        assert_eq!(config.series.overrides[0].pattern, "frieren");
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::from_toml_str("[rules\ndefault_season = ");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_season_is_rejected() {
        let result = Config::from_toml_str("[rules]\ndefault_season = -1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_extension_list() {
        let mut config = Config::default();
        config.rules.allowed_ext = vec![" . ".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_override_match() {
        let mut config = Config::default();
        config.series.overrides.push(SeriesOverride {
            pattern: "  ".to_string(),
            name: "Anything".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/non/existent/mediashelf.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_allowed_extensions_are_normalized() {
        let mut config = Config::default();
        config.rules.allowed_ext = vec![".MKV".to_string(), "mp4".to_string()];
        let allowed = config.allowed_extensions();
        assert!(allowed.contains("mkv"));
        assert!(allowed.contains("mp4"));
        assert_eq!(allowed.len(), 2);
    }

    #[test]
    fn test_resolved_paths_are_absolute() {
        let config = Config::default().resolve_paths().unwrap();
        assert!(config.paths.inbox_dir.is_absolute());
        assert!(config.paths.quarantine_dir.is_absolute());
        assert!(config.classifier.cache_path.is_absolute());
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let compiled = FilterRules::default().compile().unwrap();
        assert!(!compiled.should_include(Path::new("/inbox/.partial.mkv")));
        assert!(compiled.should_include(Path::new("/inbox/Show - 01.mkv")));
    }

    #[test]
    fn test_include_pattern_overrides_excludes() {
        let rules = FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                patterns: vec!["*/sample/*".to_string()],
                extensions: vec!["part".to_string()],
                regex: vec![r"(?i)\bsample\b".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["*/keep/*".to_string()],
            },
        };
        let compiled = rules.compile().unwrap();

        assert!(!compiled.should_include(Path::new("/inbox/show/sample/a.mkv")));
        assert!(!compiled.should_include(Path::new("/inbox/a.mkv.part")));
        assert!(!compiled.should_include(Path::new("/inbox/Show Sample.mkv")));
        assert!(compiled.should_include(Path::new("/inbox/keep/sample/a.mkv")));
    }

    #[test]
    fn test_invalid_regex_reports_pattern() {
        let rules = FilterRules {
            exclude: ExcludeRules {
                regex: vec!["(unclosed".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        match rules.compile() {
            Err(ConfigError::InvalidRegexPattern { pattern, .. }) => {
                assert_eq!(pattern, "(unclosed")
            }
            other => panic!("expected regex error, got {other:?}"),
        }
    }
}
