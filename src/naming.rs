//! Filename pattern primitives.
//!
//! Everything in this module is pure: regexes for episode numbering, the
//! keyword sets that mark specials and extras, the path-segment sanitizer and
//! the series title normalizer. The classification engine composes these.
//!
//! # Examples
//!
//! ```
//! use mediashelf::naming::{extract_season_episode, normalize_series_title};
//!
//! assert_eq!(
//!     normalize_series_title("[SubsPlease] Sousou no Frieren (1080p)"),
//!     "Sousou no Frieren"
//! );
//! assert_eq!(extract_season_episode("Show - S02E05", 1), Some((2, 5)));
//! ```

use crate::config::SeriesOverride;
use regex::Regex;
use std::sync::LazyLock;

/// Characters that media servers and common filesystems refuse in names.
pub const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Keywords that mark a special, unless explicit episode numbering is present.
pub const SPECIAL_KEYWORDS: [&str; 4] = ["OVA", "OAD", "SPECIAL", "SP"];

/// Keywords that mark bonus content destined for the extras folder.
pub const EXTRA_KEYWORDS: [&str; 12] = [
    "NCOP",
    "NCED",
    "OP",
    "ED",
    "OPENING",
    "ENDING",
    "CREDITLESS",
    "PV",
    "TRAILER",
    "CM",
    "PROMO",
    "TEASER",
];

// S01E02 / s1e2
static SEASON_EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bS(?P<season>\d{1,2})E(?P<episode>\d{1,3})\b")
        .expect("season/episode regex should compile")
});

// 1x02 / 01x002
static CROSS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<season>\d{1,2})x(?P<episode>\d{1,3})\b")
        .expect("cross regex should compile")
});

// "Title - 01 [1080p]"
static DASH_EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s-\s(?P<episode>\d{1,3})(?:\s|$)").expect("dash episode regex should compile")
});

// "QualideaCode01", "Code01v2"
static GLUED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?P<title>[a-z]+)(?P<episode>\d{2})(?P<tail>[a-z].*)?$")
        .expect("glued episode regex should compile")
});

// ASCII only: the tail slice below is taken by byte offset.
static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit run regex should compile"));

static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\(].*?[\]\)]").expect("bracket regex should compile"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));

/// Release, quality and packaging tokens stripped from folder names.
static NOISE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(480p|720p|1080p|2160p|4k)\b",
        r"(?i)\b(10bit|8bit|hdr10\+?|hdr|dv|dolby\s?vision)\b",
        r"(?i)\b(x264|x265|h\s?264|h\s?265|hevc|avc)\b",
        r"(?i)\b(aac|flac|opus|dts|truehd|ddp|eac3|ac3)\b",
        r"(?i)\b(web[-\s]?dl|webrip|web|bluray|bdrip|brrip|remux|dvd|dvdrip|hdrip)\b",
        r"(?i)\b(dual\s*audio|multi\s*audio|subbed|dubbed)\b",
        r"(?i)\b(repack|proper|uncensored)\b",
        r"(?i)\b(batch)\b",
        r"(?i)\b(s\d{1,2})\b",
        r"(?i)\b(season\s*\d{1,2})\b",
        r"(?i)\b(complete)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("noise regex should compile"))
    .collect()
});

/// Replaces reserved characters with spaces, collapses whitespace and trims.
pub fn sanitize_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| if INVALID_CHARS.contains(&ch) { ' ' } else { ch })
        .collect();
    WHITESPACE_RE
        .replace_all(replaced.trim(), " ")
        .trim()
        .to_string()
}

/// Strips release-group tags, separators and quality noise from a raw title.
///
/// Falls back to the sanitized raw value when fewer than two characters
/// survive, so a folder literally named `[HorribleSubs]` still yields a name.
pub fn normalize_series_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_tags = BRACKETED_RE.replace_all(trimmed, " ");
    let mut cleaned = without_tags.replace(['.', '_', '-'], " ");

    for noise in NOISE_RES.iter() {
        cleaned = noise.replace_all(&cleaned, " ").into_owned();
    }

    let cleaned = sanitize_name(&cleaned);
    if cleaned.chars().count() < 2 {
        sanitize_name(raw)
    } else {
        cleaned
    }
}

/// Normalizes a raw series title and applies the first matching override.
pub fn choose_series_name(raw: &str, overrides: &[SeriesOverride]) -> String {
    let cleaned = normalize_series_title(raw);
    let haystack = cleaned.to_lowercase();
    overrides
        .iter()
        .find(|rule| haystack.contains(&rule.pattern.to_lowercase()))
        .map(|rule| sanitize_name(&rule.name))
        .unwrap_or(cleaned)
}

/// True when the stem carries explicit episode numbering (`S01E02`, `1x02`, ` - 02 `).
///
/// Such files are always episodes, whatever keywords appear elsewhere.
pub fn has_explicit_numbering(stem: &str) -> bool {
    SEASON_EPISODE_RE.is_match(stem) || CROSS_RE.is_match(stem) || DASH_EPISODE_RE.is_match(stem)
}

/// True when the upper-cased filename contains one of the given keywords.
pub fn contains_keyword(filename: &str, keywords: &[&str]) -> bool {
    let upper = filename.to_uppercase();
    keywords.iter().any(|keyword| upper.contains(keyword))
}

/// A single numbering heuristic: `(stem, default_season) -> (season, episode)`.
pub type EpisodeMatcher = fn(&str, u32) -> Option<(u32, u32)>;

/// Numbering heuristics in the order they are tried. The first hit wins.
pub const EPISODE_MATCHERS: [(&str, EpisodeMatcher); 5] = [
    ("season-episode", match_season_episode),
    ("cross", match_cross),
    ("dash-episode", match_dash_episode),
    ("glued-two-digit", match_glued_two_digit),
    ("bare-number", match_bare_number),
];

/// Runs the numbering heuristics in order and returns the first match.
pub fn extract_season_episode(stem: &str, default_season: u32) -> Option<(u32, u32)> {
    EPISODE_MATCHERS
        .iter()
        .find_map(|(_, matcher)| matcher(stem, default_season))
}

fn capture_number(captures: &regex::Captures<'_>, name: &str) -> Option<u32> {
    captures.name(name)?.as_str().parse().ok()
}

fn match_season_episode(stem: &str, _default_season: u32) -> Option<(u32, u32)> {
    let captures = SEASON_EPISODE_RE.captures(stem)?;
    Some((
        capture_number(&captures, "season")?,
        capture_number(&captures, "episode")?,
    ))
}

fn match_cross(stem: &str, _default_season: u32) -> Option<(u32, u32)> {
    let captures = CROSS_RE.captures(stem)?;
    Some((
        capture_number(&captures, "season")?,
        capture_number(&captures, "episode")?,
    ))
}

fn match_dash_episode(stem: &str, default_season: u32) -> Option<(u32, u32)> {
    let captures = DASH_EPISODE_RE.captures(stem)?;
    Some((default_season, capture_number(&captures, "episode")?))
}

fn match_glued_two_digit(stem: &str, default_season: u32) -> Option<(u32, u32)> {
    let compact = stem.replace('.', "");
    let captures = GLUED_RE.captures(&compact)?;
    let episode = capture_number(&captures, "episode")?;
    (1..=99)
        .contains(&episode)
        .then_some((default_season, episode))
}

// First run of digits in the stem; a run longer than three digits contributes
// its last three.
fn match_bare_number(stem: &str, default_season: u32) -> Option<(u32, u32)> {
    let run = DIGIT_RUN_RE.find(stem)?.as_str();
    let tail_start = run.len().saturating_sub(3);
    let episode: u32 = run[tail_start..].parse().ok()?;
    (1..=400)
        .contains(&episode)
        .then_some((default_season, episode))
}
