//! End-to-end integration tests for hurlui
//!
//! These tests drive the orchestrator and the CLI against the `mock_hurl`
//! runner, which writes reports and response bodies like `hurl` does without
//! any network access.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use hurlui::cache::ResultCache;
use hurlui::runner::Invoker;
use hurlui::{ErrorKind, Orchestrator};

/// Test context with paths and cleanup
struct TestContext {
    /// Temporary directory for this test
    temp_dir: PathBuf,
    /// Directory holding the scripts
    scripts_dir: PathBuf,
    /// Root of the working directories
    artifact_root: PathBuf,
    /// Result cache database
    cache_db: PathBuf,
    /// Environment file
    env_file: PathBuf,
}

impl TestContext {
    /// Create a new test context
    fn new(test_name: &str) -> Self {
        let temp_base = env::temp_dir().join("hurlui-tests");
        let temp_dir = temp_base.join(test_name);

        // Clean up any previous test artifacts
        let _ = fs::remove_dir_all(&temp_dir);
        fs::create_dir_all(&temp_dir).expect("Failed to create temp dir");

        let scripts_dir = temp_dir.join("scripts");
        fs::create_dir_all(&scripts_dir).expect("Failed to create scripts dir");

        Self {
            artifact_root: temp_dir.join("artifacts"),
            cache_db: temp_dir.join("cache").join("results.db"),
            env_file: temp_dir.join("env.json"),
            scripts_dir,
            temp_dir,
        }
    }

    /// Write a script below the scripts directory
    fn script(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.scripts_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create script dir");
        }
        fs::write(&path, content).expect("Failed to write script");
        path
    }

    fn write_env(&self, json: &str) {
        fs::write(&self.env_file, json).expect("Failed to write env file");
    }

    fn orchestrator(&self) -> Orchestrator {
        let cache = Arc::new(ResultCache::open(&self.cache_db));
        Orchestrator::new(
            Invoker::new(mock_runner(), Vec::new()),
            &self.artifact_root,
            &self.env_file,
            cache,
        )
    }

    /// Write a config file pointing the CLI at this context
    fn config_file(&self) -> PathBuf {
        let path = self.temp_dir.join("config.toml");
        let config = format!(
            "[runner]\nbinary = {:?}\n\n[paths]\nartifact_root = {:?}\ncache_db = {:?}\nenv_file = {:?}\n",
            mock_runner().display().to_string(),
            self.artifact_root.display().to_string(),
            self.cache_db.display().to_string(),
            self.env_file.display().to_string(),
        );
        fs::write(&path, config).expect("Failed to write config");
        path
    }

    /// Run the hurlui CLI with the given arguments
    fn hurlui(&self, args: &[&str]) -> CliOutput {
        let config = self.config_file();
        let output = Command::new(env!("CARGO_BIN_EXE_hurlui"))
            .arg("--config")
            .arg(&config)
            .args(args)
            .env("RUST_LOG", "off")
            .env("XDG_DATA_HOME", self.temp_dir.join("data"))
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to run hurlui");

        CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        }
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.temp_dir);
    }
}

/// Output of a CLI invocation
struct CliOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

fn mock_runner() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_hurl"))
}

fn body_of(outcome_body: &str) -> serde_json::Value {
    serde_json::from_str(outcome_body).expect("body is JSON")
}

fn staging_env() -> &'static str {
    r#"{"global": {"host": "a"}, "environments": {"staging": {"host": "b", "token": "x"}}}"#
}

// ============== Tests ==============

#[tokio::test]
async fn test_run_merges_environment_variables() {
    let ctx = TestContext::new("run_merges_env");
    ctx.write_env(staging_env());
    let script = ctx.script("api/login.hurl", "GET http://{{host}}/login\nHTTP 200\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, Some("staging")).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.succeeded(), "warnings: {:?}", outcome.warnings);
    assert!(outcome.cached);
    assert_eq!(outcome.variables.get("host").map(String::as_str), Some("b"));
    assert_eq!(outcome.variables.get("token").map(String::as_str), Some("x"));

    let call = outcome.report.calls().next().expect("one call");
    assert_eq!(call.request.url, "http://b/login");

    let body = body_of(&call.response.body_content);
    assert_eq!(body["variables"]["host"], "b");
    assert_eq!(body["variables"]["token"], "x");
    assert!(outcome.output.contains("http://b/login"));
}

#[tokio::test]
async fn test_run_without_environment_uses_globals() {
    let ctx = TestContext::new("run_globals");
    ctx.write_env(staging_env());
    let script = ctx.script("t.hurl", "GET http://{{host}}/\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();

    assert_eq!(outcome.variables.len(), 1);
    let call = outcome.report.calls().next().unwrap();
    assert_eq!(call.request.url, "http://a/");
}

#[tokio::test]
async fn test_missing_script_is_blocking() {
    let ctx = TestContext::new("missing_script");
    let orchestrator = ctx.orchestrator();
    let script = ctx.scripts_dir.join("nope.hurl");

    let err = orchestrator.run(&script, None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InputNotFound);
    assert!(err.kind().is_blocking());
    assert!(orchestrator.cached(&script).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_runner_is_blocking() {
    let ctx = TestContext::new("missing_runner");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let orchestrator = Orchestrator::new(
        Invoker::new(ctx.temp_dir.join("no-such-runner"), Vec::new()),
        &ctx.artifact_root,
        &ctx.env_file,
        Arc::new(ResultCache::open(&ctx.cache_db)),
    );

    let err = orchestrator.run(&script, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvocationFailed);
}

#[tokio::test]
async fn test_fetch_last_returns_rehydrated_report() {
    let ctx = TestContext::new("fetch_last");
    let script = ctx.script("t.hurl", "GET http://a/one\nPOST http://a/two\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();
    let last = orchestrator.fetch_last(&script).await.unwrap();

    assert!(last.found);
    assert!(last.warnings.is_empty());
    assert_eq!(last.report, outcome.report);

    let urls: Vec<&str> = last
        .report
        .calls()
        .map(|c| c.request.url.as_str())
        .collect();
    assert_eq!(urls, vec!["http://a/one", "http://a/two"]);
    for call in last.report.calls() {
        assert!(call.response.body_file.starts_with("store/"));
        assert_eq!(body_of(&call.response.body_content)["url"], call.request.url);
    }
}

#[tokio::test]
async fn test_fetch_last_without_prior_run() {
    let ctx = TestContext::new("fetch_last_never");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let orchestrator = ctx.orchestrator();

    let last = orchestrator.fetch_last(&script).await.unwrap();

    assert!(!last.found);
    assert!(last.report.is_empty());
}

#[tokio::test]
async fn test_fetch_last_falls_back_to_cache_for_garbage_report() {
    let ctx = TestContext::new("fetch_last_garbage");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let orchestrator = ctx.orchestrator();
    let first = orchestrator.run(&script, None).await.unwrap();

    let report = orchestrator.working_dir(&script).unwrap().join("report.json");
    fs::write(&report, "not json").unwrap();

    let last = orchestrator.fetch_last(&script).await.unwrap();
    assert!(last.found);
    assert_eq!(last.report, first.report);
    assert_eq!(last.warnings[0].kind, ErrorKind::ReportParseError);
}

#[tokio::test]
async fn test_failing_assertion_is_still_cached() {
    let ctx = TestContext::new("failing_assert");
    let script = ctx.script("t.hurl", "GET http://a/missing\nHTTP 404\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();

    assert_eq!(outcome.exit_code, 4);
    assert!(!outcome.succeeded());
    assert!(!outcome.report.success());
    assert!(outcome.cached);
    assert!(outcome.output.contains("Assert status code"));

    let cached = orchestrator.cached(&script).await.unwrap().expect("cached");
    assert_eq!(cached.report, outcome.report);
    assert_eq!(cached.output, outcome.output);
}

#[tokio::test]
async fn test_crash_without_report() {
    let ctx = TestContext::new("crash");
    let script = ctx.script("t.hurl", "GET http://a/\nCRASH\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();

    assert_eq!(outcome.exit_code, 3);
    assert!(outcome.report.is_empty());
    assert!(!outcome.cached);
    assert!(outcome.output.contains("runner crashed"));
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, ErrorKind::ReportParseError);
}

#[tokio::test]
async fn test_garbage_report_is_a_warning() {
    let ctx = TestContext::new("garbage");
    let script = ctx.script("t.hurl", "GARBAGE\n");
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();

    assert_eq!(outcome.exit_code, 0);
    assert!(outcome.report.is_empty());
    assert!(!outcome.cached);
    assert_eq!(outcome.warnings[0].kind, ErrorKind::ReportParseError);
}

#[tokio::test]
async fn test_missing_body_file_is_a_warning() {
    let ctx = TestContext::new("missing_body");
    let script = ctx.script(
        "t.hurl",
        "GET http://a/one\n# no-body-file\nGET http://a/two\n",
    );
    let orchestrator = ctx.orchestrator();

    let outcome = orchestrator.run(&script, None).await.unwrap();

    assert!(outcome.succeeded());
    assert!(outcome.cached);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].kind, ErrorKind::BodyReadError);

    let calls: Vec<_> = outcome.report.calls().collect();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].response.body_content.is_empty());
    assert_eq!(body_of(&calls[1].response.body_content)["url"], "http://a/two");
}

#[tokio::test]
async fn test_rerun_replaces_previous_artifacts() {
    let ctx = TestContext::new("rerun");
    let script = ctx.script("t.hurl", "GET http://a/one\nGET http://a/two\n");
    let orchestrator = ctx.orchestrator();
    orchestrator.run(&script, None).await.unwrap();

    fs::write(&script, "GET http://a/only\n").unwrap();
    let outcome = orchestrator.run(&script, None).await.unwrap();

    let store = orchestrator.working_dir(&script).unwrap().join("store");
    assert_eq!(fs::read_dir(store).unwrap().count(), 1);
    assert_eq!(outcome.report.calls().count(), 1);
}

#[tokio::test]
async fn test_same_file_name_in_two_directories() {
    let ctx = TestContext::new("same_name");
    let a = ctx.script("a/t.hurl", "GET http://a/\n");
    let b = ctx.script("b/t.hurl", "GET http://b/\n");
    let orchestrator = ctx.orchestrator();

    orchestrator.run(&a, None).await.unwrap();
    orchestrator.run(&b, None).await.unwrap();

    let last_a = orchestrator.fetch_last(&a).await.unwrap();
    let last_b = orchestrator.fetch_last(&b).await.unwrap();
    assert_eq!(last_a.report.calls().next().unwrap().request.url, "http://a/");
    assert_eq!(last_b.report.calls().next().unwrap().request.url, "http://b/");
    assert_ne!(
        orchestrator.working_dir(&a).unwrap(),
        orchestrator.working_dir(&b).unwrap()
    );
}

#[tokio::test]
async fn test_invalidate_removes_cache_entry_and_artifacts() {
    let ctx = TestContext::new("invalidate");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let orchestrator = ctx.orchestrator();
    orchestrator.run(&script, None).await.unwrap();

    let invalidation = orchestrator.invalidate(&script).await.unwrap();

    assert!(invalidation.removed_dir);
    assert_eq!(invalidation.removed_keys, 1);
    assert!(!orchestrator.working_dir(&script).unwrap().exists());
    assert!(orchestrator.cached(&script).await.unwrap().is_none());
    assert!(!orchestrator.fetch_last(&script).await.unwrap().found);
}

#[tokio::test]
async fn test_invalidate_directory_removes_every_script_below() {
    let ctx = TestContext::new("invalidate_dir");
    let one = ctx.script("suite/one.hurl", "GET http://a/1\n");
    let two = ctx.script("suite/nested/two.hurl", "GET http://a/2\n");
    let other = ctx.script("suite-other/three.hurl", "GET http://a/3\n");
    let orchestrator = ctx.orchestrator();
    for script in [&one, &two, &other] {
        orchestrator.run(script, None).await.unwrap();
    }

    let invalidation = orchestrator
        .invalidate(&ctx.scripts_dir.join("suite"))
        .await
        .unwrap();

    assert_eq!(invalidation.removed_keys, 2);
    assert!(orchestrator.cached(&one).await.unwrap().is_none());
    assert!(orchestrator.cached(&two).await.unwrap().is_none());
    assert!(orchestrator.cached(&other).await.unwrap().is_some());
}

#[tokio::test]
async fn test_relocate_drops_results_of_both_paths() {
    let ctx = TestContext::new("relocate");
    let old = ctx.script("old.hurl", "GET http://a/\n");
    let orchestrator = ctx.orchestrator();
    orchestrator.run(&old, None).await.unwrap();

    let new = ctx.scripts_dir.join("new.hurl");
    fs::rename(&old, &new).unwrap();
    let invalidation = orchestrator.relocate(&old, &new).await.unwrap();

    assert_eq!(invalidation.removed_keys, 1);
    assert!(!orchestrator.fetch_last(&old).await.unwrap().found);
    assert!(!orchestrator.fetch_last(&new).await.unwrap().found);
}

#[tokio::test]
async fn test_concurrent_runs_of_same_script() {
    let ctx = TestContext::new("concurrent");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let orchestrator = ctx.orchestrator();

    let (first, second) = tokio::join!(
        orchestrator.run(&script, None),
        orchestrator.run(&script, None)
    );

    assert!(first.unwrap().succeeded());
    assert!(second.unwrap().succeeded());
    assert!(orchestrator.fetch_last(&script).await.unwrap().found);
}

#[tokio::test]
async fn test_results_survive_a_new_orchestrator() {
    let ctx = TestContext::new("persist");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    {
        let orchestrator = ctx.orchestrator();
        orchestrator.run(&script, None).await.unwrap();
        orchestrator.shutdown();
    }

    let orchestrator = ctx.orchestrator();
    let cached = orchestrator.cached(&script).await.unwrap().expect("persisted");
    assert_eq!(cached.report.calls().count(), 1);
}

// ============== CLI ==============

#[test]
fn test_cli_run_and_last() {
    let ctx = TestContext::new("cli_run");
    ctx.write_env(staging_env());
    let script = ctx.script("t.hurl", "GET http://{{host}}/ping\n");
    let script_arg = script.to_str().unwrap();

    let run = ctx.hurlui(&["run", script_arg, "--env", "staging"]);
    assert_eq!(run.code, Some(0), "stderr: {}", run.stderr);
    assert!(run.stdout.contains("http://b/ping"));
    assert!(run.stdout.contains("Passed"));

    let last = ctx.hurlui(&["last", script_arg, "--json"]);
    assert_eq!(last.code, Some(0));
    let report: serde_json::Value = serde_json::from_str(&last.stdout).unwrap();
    assert_eq!(report[0]["entries"][0]["calls"][0]["request"]["url"], "http://b/ping");

    let raw = ctx.hurlui(&["last", script_arg, "--raw"]);
    assert!(raw.stdout.contains("http://b/ping"));
}

#[test]
fn test_cli_run_failing_script_exit_code() {
    let ctx = TestContext::new("cli_fail");
    let script = ctx.script("t.hurl", "GET http://a/\nHTTP 500\n");

    let run = ctx.hurlui(&["run", script.to_str().unwrap()]);

    assert_eq!(run.code, Some(4));
    assert!(run.stdout.contains("Failed"));
}

#[test]
fn test_cli_missing_script() {
    let ctx = TestContext::new("cli_missing");
    let script = ctx.scripts_dir.join("nope.hurl");

    let run = ctx.hurlui(&["run", script.to_str().unwrap()]);

    assert_eq!(run.code, Some(1));
    assert!(run.stderr.contains("Error:"));
}

#[test]
fn test_cli_env_commands() {
    let ctx = TestContext::new("cli_env");
    ctx.write_env(staging_env());

    let list = ctx.hurlui(&["env", "list"]);
    assert_eq!(list.stdout.trim(), "staging");

    let show = ctx.hurlui(&["env", "show", "-e", "staging"]);
    assert_eq!(show.stdout.trim(), "host=b\ntoken=x");

    let path = ctx.hurlui(&["env", "path"]);
    assert_eq!(Path::new(path.stdout.trim()), ctx.env_file);
}

#[test]
fn test_cli_cache_commands() {
    let ctx = TestContext::new("cli_cache");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let script_arg = script.to_str().unwrap();

    let exists = ctx.hurlui(&["cache", "exists", "--script", script_arg]);
    assert_eq!(exists.code, Some(1));

    ctx.hurlui(&["run", script_arg]);

    let exists = ctx.hurlui(&["cache", "exists", "--script", script_arg]);
    assert_eq!(exists.code, Some(0));
    assert_eq!(exists.stdout.trim(), "true");

    let list = ctx.hurlui(&["cache", "list"]);
    assert_eq!(list.stdout.lines().count(), 1);

    let get = ctx.hurlui(&["cache", "get", "--script", script_arg]);
    let entry: serde_json::Value = serde_json::from_str(&get.stdout).unwrap();
    assert!(entry["outputString"].as_str().unwrap().contains("http://a/"));

    let clear = ctx.hurlui(&["cache", "clear"]);
    assert!(clear.stdout.contains("Removed 1"));
    let exists = ctx.hurlui(&["cache", "exists", "--script", script_arg]);
    assert_eq!(exists.code, Some(1));
}

#[test]
fn test_cli_invalidate() {
    let ctx = TestContext::new("cli_invalidate");
    let script = ctx.script("t.hurl", "GET http://a/\n");
    let script_arg = script.to_str().unwrap();
    ctx.hurlui(&["run", script_arg]);

    let invalidate = ctx.hurlui(&["invalidate", script_arg]);
    assert_eq!(invalidate.code, Some(0));
    assert!(invalidate.stdout.contains("1 cached result(s)"));

    let last = ctx.hurlui(&["last", script_arg]);
    assert_eq!(last.code, Some(1));
}
