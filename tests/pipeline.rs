//! Pipeline Integration Tests
//!
//! End-to-end runs against an in-memory feed: fetch, reconcile, select,
//! render and persist.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use limiteds::adapters::{FetchError, ItemSource};
use limiteds::core::{LockError, RunLock, SettingsError};
use limiteds::domain::{ItemRecord, RawFeed};
use limiteds::{Mode, Orchestrator, RunSettings, Selection};
use tempfile::TempDir;

/// Feed that always returns the same records
struct StaticSource(Vec<ItemRecord>);

#[async_trait]
impl ItemSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch_items(&self) -> Result<RawFeed, FetchError> {
        Ok(RawFeed::Records(self.0.clone()))
    }
}

/// Feed whose upstream is down
struct FailingSource;

#[async_trait]
impl ItemSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch_items(&self) -> Result<RawFeed, FetchError> {
        Err(FetchError::Status {
            url: "https://upstream.invalid/items".to_string(),
            status: 503,
        })
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn settings(root: &Path, mode: Mode, selection: Selection) -> RunSettings {
    RunSettings {
        mode,
        selection,
        known_file: root.join("known_ids.json"),
        posts_dir: root.join("_posts"),
        keep: vec![".gitkeep".to_string()],
        lock: false,
    }
}

fn orchestrator(source: impl ItemSource + 'static, settings: RunSettings) -> Orchestrator {
    Orchestrator::new(Box::new(source), settings).unwrap()
}

fn read_known(path: &Path) -> BTreeMap<String, String> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn post_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_first_run_renders_new_item() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();

    let source = StaticSource(vec![ItemRecord::new("100", "Red Hat").with_prices(50, 60)]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.fetched, 1);
    assert_eq!(report.new_ids, vec!["100".to_string()]);
    assert_eq!(report.selected, vec!["100".to_string()]);

    let known = read_known(&known_file);
    assert_eq!(known.len(), 1);
    assert_eq!(known["100"], "2024-01-10");

    let post = posts_dir.join("2024-01-10-red-hat.md");
    assert_eq!(report.rendered, vec![post.clone()]);
    let content = std::fs::read_to_string(&post).unwrap();
    assert!(content.starts_with("---\n"));
    assert!(content.contains("title: 'Red Hat'\n"));
    assert!(content.contains("date: 2024-01-10T00:00:00Z\n"));
    assert!(content.contains("- **RAP**: 50\n"));
    assert!(content.contains("- **Value**: 60\n"));
}

#[tokio::test]
async fn test_fetch_failure_changes_nothing() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();

    let original = "{\n  \"1\": \"2024-01-01\"\n}\n";
    std::fs::write(&known_file, original).unwrap();
    std::fs::create_dir_all(&posts_dir).unwrap();
    std::fs::write(posts_dir.join("2024-01-01-old-hat.md"), "old").unwrap();

    let result = orchestrator(FailingSource, settings)
        .run(date("2024-01-10"))
        .await;

    let err = result.unwrap_err();
    assert!(err.chain().any(|e| e.to_string().contains("503")));
    assert_eq!(std::fs::read_to_string(&known_file).unwrap(), original);
    assert_eq!(post_names(&posts_dir), vec!["2024-01-01-old-hat.md"]);
}

#[tokio::test]
async fn test_fetch_failure_without_prior_state() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();

    assert!(orchestrator(FailingSource, settings)
        .run(date("2024-01-10"))
        .await
        .is_err());
    assert!(!known_file.exists());
    assert!(!posts_dir.exists());
}

#[tokio::test]
async fn test_recency_window_boundary() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    std::fs::write(
        &settings.known_file,
        r#"{"inside": "2024-01-03", "outside": "2024-01-02"}"#,
    )
    .unwrap();
    let posts_dir = settings.posts_dir.clone();

    let source = StaticSource(vec![
        ItemRecord::new("inside", "Edge Hat"),
        ItemRecord::new("outside", "Old Hat"),
    ]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert!(report.new_ids.is_empty());
    assert_eq!(report.selected, vec!["inside".to_string()]);
    assert_eq!(post_names(&posts_dir), vec!["2024-01-03-edge-hat.md"]);
}

#[tokio::test]
async fn test_legacy_file_is_upgraded() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();
    std::fs::write(&known_file, r#"["100", "200"]"#).unwrap();

    let source = StaticSource(vec![
        ItemRecord::new("100", "Red Hat"),
        ItemRecord::new("200", "Blue Hat"),
        ItemRecord::new("300", "Green Hat"),
    ]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.new_ids, vec!["300".to_string()]);
    assert_eq!(post_names(&posts_dir), vec!["2024-01-10-green-hat.md"]);

    let known = read_known(&known_file);
    assert_eq!(known["100"], "1970-01-01");
    assert_eq!(known["200"], "1970-01-01");
    assert_eq!(known["300"], "2024-01-10");
}

#[tokio::test]
async fn test_legacy_ids_are_never_new() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 36500 });
    std::fs::write(&settings.known_file, r#"["100"]"#).unwrap();

    let source = StaticSource(vec![ItemRecord::new("100", "Red Hat")]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    // 1970-01-01 is still inside a century-long window
    assert_eq!(report.selected, vec!["100".to_string()]);
    assert!(report.new_ids.is_empty());
}

#[tokio::test]
async fn test_append_mode_uses_upstream_date() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();

    let created = Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 0).unwrap();
    let source = StaticSource(vec![
        ItemRecord::new("1", "Dated Hat").with_created_at(created),
        ItemRecord::new("2", "Undated Hat"),
    ]);
    orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    let known = read_known(&known_file);
    assert_eq!(known["1"], "2024-01-05");
    assert_eq!(known["2"], "2024-01-10");
    assert_eq!(
        post_names(&posts_dir),
        vec!["2024-01-05-dated-hat.md", "2024-01-10-undated-hat.md"]
    );
}

#[tokio::test]
async fn test_window_mode_ignores_upstream_date() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 3 });
    let known_file = settings.known_file.clone();

    let created = Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap();
    let source = StaticSource(vec![ItemRecord::new("1", "Hat").with_created_at(created)]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(read_known(&known_file)["1"], "2024-01-10");
    assert_eq!(report.rendered.len(), 1);
}

#[tokio::test]
async fn test_selected_item_missing_from_feed() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    std::fs::write(&settings.known_file, r#"{"999": "2024-01-09"}"#).unwrap();

    let source = StaticSource(vec![ItemRecord::new("1", "Hat")]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.selected, vec!["1".to_string(), "999".to_string()]);
    assert_eq!(report.missing, vec!["999".to_string()]);
    assert_eq!(report.rendered.len(), 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_empty_feed_still_persists() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let known_file = settings.known_file.clone();

    let report = orchestrator(StaticSource(Vec::new()), settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.fetched, 0);
    assert!(report.rendered.is_empty());
    assert_eq!(std::fs::read_to_string(&known_file).unwrap(), "{}\n");
}

#[tokio::test]
async fn test_window_mode_requires_window() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::NewOnly);

    let result = Orchestrator::new(Box::new(StaticSource(Vec::new())), settings);
    assert!(matches!(result, Err(SettingsError::WindowModeWithoutWindow)));
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    settings.lock = true;
    let known_file: PathBuf = settings.known_file.clone();

    let held = RunLock::acquire(&RunLock::path_for(&known_file)).unwrap();

    let source = StaticSource(vec![ItemRecord::new("1", "Hat")]);
    let err = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<LockError>(), Some(LockError::Held(_))));
    assert!(!known_file.exists());

    drop(held);
}

#[tokio::test]
async fn test_render_failure_does_not_stop_run() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    let known_file = settings.known_file.clone();
    let posts_dir = settings.posts_dir.clone();

    // The clean rule leaves directories alone, so this blocks one artifact
    std::fs::create_dir_all(posts_dir.join("2024-01-10-blocked-hat.md")).unwrap();

    let source = StaticSource(vec![
        ItemRecord::new("1", "Blocked Hat"),
        ItemRecord::new("2", "Fine Hat"),
    ]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].item_id, "1");
    assert_eq!(report.rendered, vec![posts_dir.join("2024-01-10-fine-hat.md")]);
    assert!(report.persist_error.is_none());
    assert!(!report.is_clean());

    let known = read_known(&known_file);
    assert_eq!(known["1"], "2024-01-10");
    assert_eq!(known["2"], "2024-01-10");
}

#[tokio::test]
async fn test_persist_failure_keeps_artifacts() {
    let temp = TempDir::new().unwrap();
    let mut settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let posts_dir = settings.posts_dir.clone();
    let post = posts_dir.join("2024-01-10-red-hat.md");

    // Absent at load time; by save time the rendered post sits where a
    // directory is needed
    settings.known_file = post.join("known_ids.json");

    let source = StaticSource(vec![ItemRecord::new("100", "Red Hat")]);
    let report = orchestrator(source, settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.rendered, vec![post.clone()]);
    assert!(post.is_file());
    assert!(report.persist_error.is_some());
    assert!(!report.is_clean());
}

fn colliding_feed() -> StaticSource {
    StaticSource(vec![
        ItemRecord::new("1", "Red Hat").with_prices(10, 10),
        ItemRecord::new("2", "red hat!").with_prices(20, 20),
    ])
}

#[tokio::test]
async fn test_slug_collision_last_overwrite_wins_in_window_mode() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Window, Selection::Window { days: 7 });
    let post = settings.posts_dir.join("2024-01-10-red-hat.md");

    let report = orchestrator(colliding_feed(), settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.rendered, vec![post.clone(), post.clone()]);
    assert!(report.skipped.is_empty());
    let content = std::fs::read_to_string(&post).unwrap();
    assert!(content.contains("- **ID**: 2\n"));
    assert!(content.contains("title: 'red hat!'\n"));
}

#[tokio::test]
async fn test_slug_collision_first_render_wins_in_append_mode() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), Mode::Append, Selection::NewOnly);
    let post = settings.posts_dir.join("2024-01-10-red-hat.md");

    let report = orchestrator(colliding_feed(), settings)
        .run(date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(report.rendered, vec![post.clone()]);
    assert_eq!(report.skipped, vec![post.clone()]);
    let content = std::fs::read_to_string(&post).unwrap();
    assert!(content.contains("- **ID**: 1\n"));
    assert!(content.contains("title: 'Red Hat'\n"));
}
