use mediashelf::cli::{Command, run_cli};
/// Integration tests for mediashelf
///
/// These tests drive the public `run_cli` entry point against a temporary
/// inbox/library/quarantine tree described by a generated TOML config.
///
/// Test categories:
/// 1. Apply layouts (episodes, specials, extras, quarantine)
/// 2. Collisions and filters
/// 3. Log, status files and cleanup
/// 4. Scan preview
/// 5. Rollback
/// 6. Configuration and error scenarios
use mediashelf::executor::OperationLog;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace with `inbox/`, `library/`, `quarantine/` and a
/// config file pointing at them.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture = TestFixture { temp_dir };
        fs::create_dir_all(fixture.path().join("inbox")).expect("Failed to create inbox");
        fixture.write_config("");
        fixture
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `config.toml` with the fixture paths followed by `extra` TOML.
    fn write_config(&self, extra: &str) {
        let content = format!(
            "[paths]\ninbox_dir = '{}'\ndest_root = '{}'\nquarantine_dir = '{}'\n\n[classifier]\ncache_path = '{}'\n\n{}",
            self.path().join("inbox").display(),
            self.path().join("library").display(),
            self.path().join("quarantine").display(),
            self.path().join("cache.jsonl").display(),
            extra
        );
        fs::write(self.config_path(), content).expect("Failed to write config");
    }

    fn config_path(&self) -> PathBuf {
        self.path().join("config.toml")
    }

    fn log_path(&self) -> PathBuf {
        self.path().join("run-log.jsonl")
    }

    fn status_base(&self) -> PathBuf {
        self.path().join("reports").join("status")
    }

    /// Creates a file under the inbox, with parent folders.
    fn create_inbox_file(&self, rel_path: &str, content: &str) {
        let path = self.path().join("inbox").join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file");
    }

    fn create_file(&self, rel_path: &str, content: &str) {
        let path = self.path().join(rel_path);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
        fs::write(&path, content).expect("Failed to write file");
    }

    fn apply(&self, no_cleanup: bool) -> anyhow::Result<()> {
        run_cli(
            Command::Apply {
                log: self.log_path(),
                status: self.status_base(),
                no_cleanup,
            },
            Some(&self.config_path()),
        )
    }

    fn scan(&self) -> anyhow::Result<()> {
        run_cli(Command::Scan, Some(&self.config_path()))
    }

    fn rollback(&self) -> anyhow::Result<()> {
        run_cli(
            Command::Rollback {
                log: self.log_path(),
            },
            None,
        )
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.exists() && path.is_file(),
            "File should exist: {}",
            path.display()
        );
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn read(&self, rel_path: &str) -> String {
        fs::read_to_string(self.path().join(rel_path)).expect("Failed to read file")
    }
}

// ============================================================================
// 1. Apply Layouts
// ============================================================================

#[test]
fn test_apply_files_episode_into_season_folder() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "ep1");

    fixture.apply(false).expect("apply should succeed");

    fixture.assert_file_exists("library/Frieren/Season 01/Frieren - S01E01.mkv");
    fixture.assert_file_not_exists("inbox/Frieren/Frieren - 01.mkv");
    assert_eq!(
        fixture.read("library/Frieren/Season 01/Frieren - S01E01.mkv"),
        "ep1"
    );
}

#[test]
fn test_apply_uses_normalized_folder_name_as_series() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file(
        "[SubsPlease] Spy x Family (1080p)/Spy x Family S02E03.mkv",
        "",
    );

    fixture.apply(false).unwrap();

    fixture.assert_file_exists("library/Spy x Family/Season 02/Spy x Family - S02E03.mkv");
}

#[test]
fn test_apply_routes_specials_and_extras() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren NCOP.mkv", "");
    fixture.create_inbox_file("Frieren/Frieren Special.mkv", "");

    fixture.apply(false).unwrap();

    fixture.assert_file_exists("library/Frieren/extras/other/Frieren - Frieren NCOP.mkv");
    fixture.assert_file_exists("library/Frieren/Season 00/Frieren - Frieren Special.mkv");
}

#[test]
fn test_extras_rules_and_series_overrides_apply_in_order() {
    let fixture = TestFixture::new();
    fixture.write_config(
        r#"
[[rules.extras]]
keyword = "NCOP"
bucket = "creditless"

[[rules.extras]]
keyword = "OP"
bucket = "openings"

[[series.overrides]]
match = "sousou"
name = "Frieren: Beyond Journey's End"
"#,
    );
    fixture.create_inbox_file("Sousou no Frieren/Sousou no Frieren NCOP.mkv", "");

    fixture.apply(false).unwrap();

    fixture.assert_file_exists(
        "library/Frieren Beyond Journey's End/extras/creditless/Frieren Beyond Journey's End - Sousou no Frieren NCOP.mkv",
    );
}

#[test]
fn test_unknown_files_are_quarantined_with_original_name() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Misc/weird.mkv", "?");

    fixture.apply(false).unwrap();

    fixture.assert_file_exists("quarantine/weird.mkv");
}

// ============================================================================
// 2. Collisions and Filters
// ============================================================================

#[test]
fn test_collision_gets_dup_suffix_and_keeps_existing_file() {
    let fixture = TestFixture::new();
    fixture.create_file("library/Frieren/Season 01/Frieren - S01E01.mkv", "existing");
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "incoming");

    fixture.apply(false).unwrap();

    assert_eq!(
        fixture.read("library/Frieren/Season 01/Frieren - S01E01.mkv"),
        "existing"
    );
    assert_eq!(
        fixture.read("library/Frieren/Season 01/Frieren - S01E01__dup1.mkv"),
        "incoming"
    );

    let log = OperationLog::load(&fixture.log_path()).unwrap();
    assert!(log.records[0].dst.ends_with("Frieren - S01E01__dup1.mkv"));
}

#[test]
fn test_non_media_and_excluded_files_stay_in_inbox() {
    let fixture = TestFixture::new();
    fixture.write_config("[filters.exclude]\npatterns = [\"*/sample/*\"]\n");
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");
    fixture.create_inbox_file("Frieren/readme.txt", "");
    fixture.create_inbox_file("Frieren/sample/Frieren - 02.mkv", "");
    fixture.create_inbox_file("Frieren/.partial - 03.mkv", "");

    fixture.apply(false).unwrap();

    fixture.assert_file_exists("library/Frieren/Season 01/Frieren - S01E01.mkv");
    fixture.assert_file_exists("inbox/Frieren/readme.txt");
    fixture.assert_file_exists("inbox/Frieren/sample/Frieren - 02.mkv");
    fixture.assert_file_exists("inbox/Frieren/.partial - 03.mkv");
}

// ============================================================================
// 3. Log, Status Files and Cleanup
// ============================================================================

#[test]
fn test_apply_writes_log_and_status_files() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");
    fixture.create_inbox_file("Misc/weird.mkv", "");

    fixture.apply(false).unwrap();

    let log = OperationLog::load(&fixture.log_path()).unwrap();
    assert_eq!(log.records.len(), 2);

    let rows: serde_json::Value =
        serde_json::from_str(&fixture.read("reports/status.json")).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let statuses: Vec<_> = rows.iter().map(|r| r["status"].as_str().unwrap()).collect();
    assert!(statuses.contains(&"MOVED"));
    assert!(statuses.contains(&"QUARANTINED"));

    let csv = fixture.read("reports/status.csv");
    assert!(csv.starts_with("src,dst,decision_kind,status"));
    assert_eq!(csv.lines().count(), 3);
}

#[test]
fn test_apply_reclaims_empty_inbox_folders() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Batch/Frieren - 01.mkv", "");
    fixture.create_inbox_file("Other/notes.txt", "");

    fixture.apply(false).unwrap();

    assert!(!fixture.path().join("inbox/Frieren").exists());
    fixture.assert_file_exists("inbox/Other/notes.txt");
    assert!(fixture.path().join("inbox").is_dir());
}

#[test]
fn test_no_cleanup_keeps_empty_folders() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");

    fixture.apply(true).unwrap();

    assert!(fixture.path().join("inbox/Frieren").is_dir());
}

#[test]
fn test_empty_inbox_is_not_an_error() {
    let fixture = TestFixture::new();

    fixture.apply(false).unwrap();

    fixture.assert_file_not_exists("run-log.jsonl");
}

// ============================================================================
// 4. Scan Preview
// ============================================================================

#[test]
fn test_scan_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");
    fixture.create_inbox_file("Misc/weird.mkv", "");

    fixture.scan().expect("scan should succeed");

    fixture.assert_file_exists("inbox/Frieren/Frieren - 01.mkv");
    fixture.assert_file_exists("inbox/Misc/weird.mkv");
    assert!(!fixture.path().join("library").exists());
    assert!(!fixture.path().join("quarantine").exists());
    fixture.assert_file_not_exists("run-log.jsonl");
    fixture.assert_file_not_exists("reports/status.json");
}

// ============================================================================
// 5. Rollback
// ============================================================================

#[test]
fn test_apply_then_rollback_restores_inbox() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "1");
    fixture.create_inbox_file("Frieren/Frieren NCOP.mkv", "op");
    fixture.create_inbox_file("Misc/weird.mkv", "?");

    fixture.apply(false).unwrap();
    fixture.assert_file_not_exists("inbox/Frieren/Frieren - 01.mkv");

    fixture.rollback().expect("rollback should succeed");

    assert_eq!(fixture.read("inbox/Frieren/Frieren - 01.mkv"), "1");
    assert_eq!(fixture.read("inbox/Frieren/Frieren NCOP.mkv"), "op");
    assert_eq!(fixture.read("inbox/Misc/weird.mkv"), "?");
    fixture.assert_file_not_exists("library/Frieren/Season 01/Frieren - S01E01.mkv");
    fixture.assert_file_not_exists("quarantine/weird.mkv");
}

#[test]
fn test_rollback_skips_files_removed_since_apply() {
    let fixture = TestFixture::new();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");
    fixture.create_inbox_file("Frieren/Frieren - 02.mkv", "");
    fixture.apply(true).unwrap();

    fs::remove_file(
        fixture
            .path()
            .join("library/Frieren/Season 01/Frieren - S01E02.mkv"),
    )
    .unwrap();

    fixture.rollback().expect("missing destinations are not failures");

    fixture.assert_file_exists("inbox/Frieren/Frieren - 01.mkv");
    fixture.assert_file_not_exists("inbox/Frieren/Frieren - 02.mkv");
}

#[test]
fn test_rollback_without_log_fails() {
    let fixture = TestFixture::new();
    assert!(fixture.rollback().is_err());
}

// ============================================================================
// 6. Configuration and Error Scenarios
// ============================================================================

#[test]
fn test_missing_config_file_is_an_error() {
    let fixture = TestFixture::new();
    let result = run_cli(
        Command::Scan,
        Some(&fixture.path().join("does-not-exist.toml")),
    );
    assert!(result.is_err());
}

#[test]
fn test_invalid_config_is_an_error() {
    let fixture = TestFixture::new();
    fixture.write_config("[filters.exclude]\nregex = [\"(unclosed\"]\n");
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");

    assert!(fixture.apply(false).is_err());
    fixture.assert_file_exists("inbox/Frieren/Frieren - 01.mkv");
}

#[test]
fn test_missing_inbox_is_an_error() {
    let fixture = TestFixture::new();
    fs::remove_dir(fixture.path().join("inbox")).unwrap();

    assert!(fixture.scan().is_err());
}

#[test]
fn test_disabled_classifier_budget_never_touches_cache() {
    let fixture = TestFixture::new();
    fixture.write_config("");
    let config = fs::read_to_string(fixture.config_path())
        .unwrap()
        .replace("[classifier]\n", "[classifier]\nenabled = true\nmax_calls = 0\n");
    fs::write(fixture.config_path(), config).unwrap();
    fixture.create_inbox_file("Frieren/Frieren - 01.mkv", "");

    fixture.apply(false).unwrap();

    fixture.assert_file_exists("library/Frieren/Season 01/Frieren - S01E01.mkv");
    fixture.assert_file_not_exists("cache.jsonl");
}
