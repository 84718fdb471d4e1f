// Tests for the poll-diff-patch-notify pipeline

use relink_core::config::AppConfig;
use relink_core::notify::{ConfiguredNotifier, Notifier};
use relink_core::pipeline::{RunOptions, RunOutcome, WriteTarget, run};
use relink_core::store::{MemoryStore, RecordStore, RunRecord, SqliteStore};
use relink_core::{Change, CoreError, LinkMap, Result};
use relink_scanner::ScanError;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const RCLONE_CONF: &str = "[Hindi]\ntype = http\nurl = http://old/hindi\n\n[English]\ntype = http\nurl = http://b/english\n";

const LISTING: &str = r#"<html><body><ul>
    <li><a class="hvr-bounce-to-bottom" href="http://a/hindi">Hindi Movies</a></li>
    <li><a class="hvr-bounce-to-bottom" href="http://b/english">English Movies</a></li>
    <li><a class="hvr-bounce-to-bottom" href="http://c/docs">Documentary</a></li>
</ul></body></html>"#;

/// Collects the labels it was asked to announce.
#[derive(Default)]
struct RecordingNotifier {
    sent: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, change: &Change) -> Result<()> {
        self.sent.borrow_mut().push(change.label.clone());
        Ok(())
    }
}

/// Reads fine, refuses every write.
#[derive(Default)]
struct ReadOnlyStore {
    inner: MemoryStore,
}

impl RecordStore for ReadOnlyStore {
    fn get_all(&self) -> Result<LinkMap> {
        self.inner.get_all()
    }

    fn upsert(&mut self, _label: &str, _url: &str) -> Result<()> {
        Err(CoreError::Io(std::io::Error::other("disk full")))
    }

    fn record_run(&mut self, _run: &RunRecord) -> Result<()> {
        Err(CoreError::Io(std::io::Error::other("disk full")))
    }

    fn runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        self.inner.runs(limit)
    }
}

async fn serve_listing(body: &str) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(body),
        )
        .mount(&mock_server)
        .await;
    mock_server
}

fn write_rclone_conf(dir: &Path) -> PathBuf {
    let conf_path = dir.join("rclone.conf");
    fs::write(&conf_path, RCLONE_CONF).unwrap();
    conf_path
}

fn test_config(candidates: &[String], conf_path: &Path, extra: &str) -> AppConfig {
    let candidates = candidates
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    AppConfig::from_toml_str(&format!(
        r#"
site_name = "SamFTP"

[source]
candidates = [{candidates}]
timeout_secs = 5

[rclone]
config_path = "{}"
field = "url"

{extra}

[mappings]
"Hindi Movies" = "Hindi"
"English Movies" = "English"
"Korean Series" = "KoreanSeries"
"#,
        conf_path.display()
    ))
    .unwrap()
}

// ============================================================================
// Full Runs
// ============================================================================

#[tokio::test]
async fn test_first_run_records_patches_and_notifies() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let report = run(&config, &mut store, &notifier, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Updated);
    assert!(report.is_success());
    assert_eq!(report.extracted, 3);
    assert_eq!(report.detection.changes.added.len(), 3);
    assert_eq!(report.unmapped, vec!["Documentary".to_string()]);
    assert_eq!(report.patch.touched, vec!["Hindi Movies".to_string()]);
    assert_eq!(report.patch.unobserved, vec!["Korean Series".to_string()]);
    assert_eq!(report.notifications.sent, 3);

    assert_eq!(
        fs::read_to_string(&conf_path).unwrap(),
        RCLONE_CONF.replace("http://old/hindi", "http://a/hindi")
    );
    assert_eq!(store.get_all().unwrap().len(), 3);
    assert_eq!(store.runs(10).unwrap().len(), 1);
    assert_eq!(
        *notifier.sent.borrow(),
        vec!["Hindi Movies", "English Movies", "Documentary"]
    );
}

#[tokio::test]
async fn test_second_run_is_a_noop() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut store = SqliteStore::open(&temp_dir.path().join("relink.db")).unwrap();
    let notifier = RecordingNotifier::default();

    run(&config, &mut store, &notifier, RunOptions::default())
        .await
        .unwrap();
    let after_first = fs::read_to_string(&conf_path).unwrap();

    let report = run(&config, &mut store, &notifier, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoChanges);
    assert!(report.detection.changes.is_empty());
    assert!(!report.patch.rewritten);
    assert_eq!(report.notifications.sent, 0);
    assert_eq!(fs::read_to_string(&conf_path).unwrap(), after_first);
    assert_eq!(notifier.sent.borrow().len(), 3);

    let runs = store.runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].outcome, "no_changes");
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut store = MemoryStore::new();
    let notifier = RecordingNotifier::default();
    let report = run(&config, &mut store, &notifier, RunOptions { dry_run: true })
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.outcome, RunOutcome::Updated);
    assert!(report.patch.rewritten);
    assert_eq!(fs::read_to_string(&conf_path).unwrap(), RCLONE_CONF);
    assert!(store.get_all().unwrap().is_empty());
    assert!(store.runs(10).unwrap().is_empty());
    // Dry runs only log their messages
    assert!(notifier.sent.borrow().is_empty());
}

#[tokio::test]
async fn test_falls_back_to_next_candidate() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(
        &["http://127.0.0.1:1/".to_string(), mock_server.uri()],
        &conf_path,
        "",
    );

    let report = run(
        &config,
        &mut MemoryStore::new(),
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap();

    assert!(report.source.starts_with(&mock_server.uri()));
}

#[tokio::test]
async fn test_telegram_notifications_from_config() {
    let mock_server = serve_listing(LISTING).await;
    let telegram = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bot123:ABC/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
        .expect(3)
        .mount(&telegram)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(
        &[mock_server.uri()],
        &conf_path,
        &format!(
            "[telegram]\nbot_token = \"123:ABC\"\nchat_id = \"-10042\"\napi_base = \"{}\"\n",
            telegram.uri()
        ),
    );

    let client = relink_scanner::build_client(5, "relink-test").unwrap();
    let notifier = ConfiguredNotifier::from_config(&config, client).unwrap();
    let report = run(&config, &mut MemoryStore::new(), &notifier, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(report.notifications.sent, 3);
    assert_eq!(report.notifications.failed, 0);
}

#[tokio::test]
async fn test_relative_links_resolve_against_redirect_target() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/mirror/"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mirror/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ul><li><a class="hvr-bounce-to-bottom" href="hindi/">Hindi Movies</a></li></ul>"#,
        ))
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut store = MemoryStore::new();
    run(
        &config,
        &mut store,
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap();

    let expected = format!("{}/mirror/hindi/", mock_server.uri());
    assert_eq!(
        store.get_all().unwrap().get("Hindi Movies"),
        Some(&expected)
    );
    assert!(
        fs::read_to_string(&conf_path)
            .unwrap()
            .contains(&format!("url = {}\n", expected))
    );
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_sources_abort() {
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&["http://127.0.0.1:1/".to_string()], &conf_path, "");

    let mut store = MemoryStore::new();
    let err = run(
        &config,
        &mut store,
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CoreError::Unreachable { .. }));
    assert!(store.runs(10).unwrap().is_empty());
    assert_eq!(fs::read_to_string(&conf_path).unwrap(), RCLONE_CONF);
}

#[tokio::test]
async fn test_unreadable_rclone_conf_aborts() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(
        &[mock_server.uri()],
        &temp_dir.path().join("missing.conf"),
        "",
    );

    let mut store = MemoryStore::new();
    let err = run(
        &config,
        &mut store,
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CoreError::ConfigDocument { .. }));
    assert!(store.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_strict_pairing_mismatch_aborts() {
    let listing = r#"<ul>
        <li><a class="hvr-bounce-to-bottom" href="http://a/hindi">Hindi Movies</a></li>
        <li><a class="hvr-bounce-to-bottom">English Movies</a></li>
    </ul>"#;
    let mock_server = serve_listing(listing).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let err = run(
        &config,
        &mut MemoryStore::new(),
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Scan(ScanError::ShapeMismatch {
            links: 1,
            labels: 2
        })
    ));
}

#[tokio::test]
async fn test_store_failure_keeps_computed_changes() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut store = ReadOnlyStore::default();
    let report = run(
        &config,
        &mut store,
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap();

    assert!(!report.is_success());
    let store_failures = report
        .failures
        .iter()
        .filter(|f| f.target == WriteTarget::Store)
        .count();
    assert_eq!(store_failures, 3);
    assert!(report.failures.iter().any(|f| f.target == WriteTarget::History));

    // The computed mapping survives and the rclone config was still patched
    assert_eq!(report.detection.mapping.len(), 3);
    assert!(fs::read_to_string(&conf_path).unwrap().contains("url = http://a/hindi\n"));
}

#[tokio::test]
async fn test_document_write_failure_is_reported() {
    let mock_server = serve_listing(LISTING).await;
    let temp_dir = TempDir::new().unwrap();
    let conf_path = write_rclone_conf(temp_dir.path());
    let config = test_config(&[mock_server.uri()], &conf_path, "");

    let mut permissions = fs::metadata(&conf_path).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&conf_path, permissions).unwrap();

    // Root ignores read-only bits, so only check when the write really fails
    if fs::OpenOptions::new().write(true).open(&conf_path).is_ok() {
        return;
    }

    let mut store = MemoryStore::new();
    let report = run(
        &config,
        &mut store,
        &RecordingNotifier::default(),
        RunOptions::default(),
    )
    .await
    .unwrap();

    assert!(
        report
            .failures
            .iter()
            .any(|f| f.target == WriteTarget::Document)
    );
    assert_eq!(store.get_all().unwrap().len(), 3);
    assert_eq!(fs::read_to_string(&conf_path).unwrap(), RCLONE_CONF);
}
