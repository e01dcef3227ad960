use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn charts_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("charts");
    path
}

const ORICON_PAGE: &str = r#"<html><body>
<section class="box-rank-entry"><div class="media-box">
  <p class="media-rank">1</p>
  <ul><li class="media-title">Plazma</li><li class="media-artist">米津玄師</li></ul>
</div></section>
<section class="box-rank-entry"><div class="media-box">
  <p class="media-rank">2</p>
  <ul><li class="media-title">ダーリン</li><li class="media-artist">Mrs. GREEN APPLE</li></ul>
</div></section>
</body></html>
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let pages_dir = root.join("pages");
    fs::create_dir_all(&pages_dir).unwrap();

    let oricon_page = pages_dir.join("oricon.html");
    fs::write(&oricon_page, ORICON_PAGE).unwrap();
    let oricon_url = url::Url::from_file_path(&oricon_page).unwrap();
    let missing_url = url::Url::from_file_path(pages_dir.join("missing.html")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/charts.sqlite"

[charts.test-chart]
extractor = "sample"
url = "builtin:sample"

[charts.oricon]
extractor = "oricon"
url = "{}"

[charts.broken]
extractor = "sample"
url = "{}"
include_in_all = false
"#,
        root.display(),
        oricon_url,
        missing_url
    );

    let config_path = config_dir.join("charts.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_charts(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = charts_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run charts binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn list_json(config_path: &Path, chart: Option<&str>) -> Vec<serde_json::Value> {
    let mut args = vec!["list", "--json"];
    if let Some(chart) = chart {
        args.extend(["--chart", chart]);
    }
    let (stdout, stderr, success) = run_charts(config_path, &args);
    assert!(success, "list failed: {}", stderr);
    serde_json::from_str::<Vec<serde_json::Value>>(&stdout).unwrap()
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_charts(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_charts(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_charts(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_crawl_sample_chart() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["init"]);
    let (stdout, stderr, success) = run_charts(&config_path, &["crawl", "test-chart"]);
    assert!(success, "crawl failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("strategy: primary"));
    assert!(stdout.contains("extracted: 3"));
    assert!(stdout.contains("inserted: 3"));
    assert!(stdout.contains("ok"));

    let songs = list_json(&config_path, Some("test-chart"));
    let ranks: Vec<u64> = songs.iter().map(|s| s["ranking"].as_u64().unwrap()).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(songs[0]["title"], "Pretender");
}

#[test]
fn test_recrawl_purges_then_reinserts() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["crawl", "test-chart"]);
    let (stdout, stderr, success) = run_charts(&config_path, &["crawl", "test-chart"]);
    assert!(success, "second crawl failed: {}", stderr);
    assert!(stdout.contains("purged: 3"));
    assert!(stdout.contains("inserted: 3"));

    assert_eq!(list_json(&config_path, None).len(), 3);
}

#[test]
fn test_crawl_all_skips_excluded_charts() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_charts(&config_path, &["crawl", "all"]);
    assert!(success, "crawl all failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("crawl oricon"));
    assert!(stdout.contains("crawl test-chart"));
    assert!(!stdout.contains("crawl broken"));

    let oricon = list_json(&config_path, Some("oricon"));
    assert_eq!(oricon.len(), 2);
    assert_eq!(oricon[1]["artist"], "Mrs. GREEN APPLE");
}

#[test]
fn test_failed_fetch_exits_nonzero() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _stderr, success) = run_charts(&config_path, &["crawl", "broken"]);
    assert!(!success, "crawl of a missing file should fail");
    assert!(stdout.contains("failed at fetch"));
}

#[test]
fn test_unknown_chart_is_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_stdout, stderr, success) = run_charts(&config_path, &["crawl", "spotify"]);
    assert!(!success);
    assert!(stderr.contains("unknown chart"));
    assert!(stderr.contains("test-chart"));
}

#[test]
fn test_add_and_readd_song() {
    let (_tmp, config_path) = setup_test_env();

    let add = |rank: &str| {
        run_charts(
            &config_path,
            &[
                "add", "--title", "Pretender", "--artist", "Official髭男dism", "--rank", rank,
                "--chart", "oricon",
            ],
        )
    };
    let (stdout, stderr, success) = add("3");
    assert!(success, "add failed: {}", stderr);
    assert!(stdout.contains("added song"));

    let (stdout, _, success) = add("1");
    assert!(success);
    assert!(stdout.contains("updated song"));

    let songs = list_json(&config_path, Some("oricon"));
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["ranking"], 1);
}

#[test]
fn test_add_invalid_song_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_charts(
        &config_path,
        &["add", "--title", "Echo", "--artist", "Echo", "--rank", "1", "--chart", "oricon"],
    );
    assert!(!success);
    assert!(stderr.contains("title equals artist"));
}

#[test]
fn test_cleanup_all_requires_yes() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["crawl", "test-chart"]);

    let (_, stderr, success) = run_charts(&config_path, &["cleanup", "all"]);
    assert!(!success);
    assert!(stderr.contains("--yes"));
    assert_eq!(list_json(&config_path, None).len(), 3);

    let (stdout, _, success) = run_charts(&config_path, &["cleanup", "all", "--yes"]);
    assert!(success);
    assert!(stdout.contains("deleted: 3"));
    assert!(list_json(&config_path, None).is_empty());
}

#[test]
fn test_cleanup_auto_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["crawl", "test-chart"]);

    let (stdout, stderr, success) = run_charts(&config_path, &["cleanup", "auto"]);
    assert!(success, "cleanup failed: {}", stderr);
    assert!(stdout.contains("total deleted: 0"));
}

#[test]
fn test_cleanup_chart_purges_one_chart() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["crawl", "all"]);
    let (stdout, _, success) = run_charts(&config_path, &["cleanup", "chart", "oricon"]);
    assert!(success);
    assert!(stdout.contains("deleted: 2"));
    assert_eq!(list_json(&config_path, None).len(), 3);
}

#[test]
fn test_status_lists_charts() {
    let (_tmp, config_path) = setup_test_env();

    run_charts(&config_path, &["crawl", "test-chart"]);
    let (stdout, stderr, success) = run_charts(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("CHART"));
    assert!(stdout.contains("test-chart"));
    assert!(stdout.contains("broken*"));
    assert!(stdout.contains("never"));
}

#[test]
fn test_json_progress_on_stderr() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_charts(&config_path, &["--progress", "json", "crawl", "test-chart"]);
    assert!(success);
    assert!(stderr.contains(r#""event":"stage""#));
    assert!(stderr.contains(r#""event":"extracted""#));
    assert!(!stdout.contains(r#""event""#));
}

#[cfg(unix)]
#[test]
fn test_second_process_for_same_chart_is_busy() {
    use std::io::Write;

    let (tmp, config_path) = setup_test_env();
    let root = tmp.path();

    // A FIFO keeps the first run parked in its fetch stage until we write.
    let fifo = root.join("pages").join("slow.html");
    let made = Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(made.success(), "mkfifo failed");
    let fifo_url = url::Url::from_file_path(&fifo).unwrap();

    let mut config = fs::read_to_string(&config_path).unwrap();
    config.push_str(&format!(
        "\n[charts.slow]\nextractor = \"sample\"\nurl = \"{}\"\ninclude_in_all = false\n",
        fifo_url
    ));
    fs::write(&config_path, config).unwrap();
    run_charts(&config_path, &["init"]);

    let first = Command::new(charts_binary())
        .arg("--config")
        .arg(&config_path)
        .args(["crawl", "slow"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Opening the write end blocks until the first run opens the FIFO in fetch.
    let mut writer = fs::OpenOptions::new().write(true).open(&fifo).unwrap();

    let (stdout, stderr, success) = run_charts(&config_path, &["crawl", "slow"]);
    assert!(success, "busy run should not fail: {}", stderr);
    assert!(stdout.contains("busy"), "expected busy, got: {}", stdout);
    assert!(!stdout.contains("inserted"));

    writer
        .write_all(
            br#"<div class="song-item"><span class="rank">1</span><span class="title">Plazma</span><span class="artist">Kenshi Yonezu</span></div>"#,
        )
        .unwrap();
    drop(writer);

    let output = first.wait_with_output().unwrap();
    let first_stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "first run failed: {}", first_stdout);
    assert!(first_stdout.contains("inserted: 1"));

    let songs = list_json(&config_path, Some("slow"));
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["title"], "Plazma");
}
