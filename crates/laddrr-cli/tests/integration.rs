#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn laddrr(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("laddrr").unwrap();
    cmd.current_dir(dir.path())
        .env("LADDRR_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_project(dir: &TempDir) {
    laddrr(dir).arg("init").assert().success();
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

// ---------------------------------------------------------------------------
// laddrr init / config
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config_and_store_dir() {
    let dir = TempDir::new().unwrap();
    laddrr(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .laddrr/config.yaml"));
    assert!(dir.path().join(".laddrr/config.yaml").exists());
    assert!(dir.path().join(".laddrr/store").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    laddrr(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .laddrr/config.yaml"));
}

#[test]
fn config_show_json_has_defaults() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let cfg = stdout_json(laddrr(&dir).args(["--json", "config", "show"]));
    assert_eq!(cfg["store"]["medium"], "file");
    assert_eq!(cfg["server"]["port"], 3141);
    assert_eq!(cfg["llm"]["backend"]["type"], "anthropic");
}

#[test]
fn config_validate_requires_init() {
    let dir = TempDir::new().unwrap();
    laddrr(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error:"));
}

// ---------------------------------------------------------------------------
// laddrr flow
// ---------------------------------------------------------------------------

#[test]
fn flow_list_names_every_flow() {
    let dir = TempDir::new().unwrap();
    laddrr(&dir)
        .args(["flow", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("generateSurveyQuestions"))
        .stdout(predicate::str::contains("summarizeAnonymousFeedback"))
        .stdout(predicate::str::contains("trackFeedback"));
}

#[test]
fn flow_run_rejects_invalid_input_before_any_model_call() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    laddrr(&dir)
        .args(["flow", "run", "rewriteText", "--input", r#"{"textToRewrite":""}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid input for rewriteText"));
}

#[test]
fn flow_run_unknown_flow_fails() {
    let dir = TempDir::new().unwrap();
    laddrr(&dir)
        .args(["flow", "run", "doTheThing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown flow: doTheThing"));
}

#[test]
fn store_flows_run_without_a_model() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    let out = stdout_json(laddrr(&dir).args([
        "flow",
        "run",
        "submitAnonymousFeedback",
        "--input",
        r#"{"subject":"Workload","message":"Too many parallel projects."}"#,
    ]));
    let id = out["trackingId"].as_str().unwrap().to_string();

    let tracked = stdout_json(laddrr(&dir).args([
        "flow",
        "run",
        "trackFeedback",
        "--input",
        format!(r#"{{"trackingId":"{id}"}}"#).as_str(),
    ]));
    assert_eq!(tracked["found"], true);
    assert_eq!(tracked["feedback"]["subject"], "Workload");
}

// ---------------------------------------------------------------------------
// laddrr survey
// ---------------------------------------------------------------------------

#[test]
fn survey_lifecycle_with_custom_questions() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let survey = stdout_json(laddrr(&dir).args([
        "--json",
        "survey",
        "deploy",
        "--objective",
        "measure morale",
        "--question",
        "How supported do you feel?",
        "--question",
        "What would you change?",
    ]));
    let id = survey["id"].as_str().unwrap().to_string();
    assert_eq!(survey["questions"].as_array().unwrap().len(), 2);

    laddrr(&dir).args(["survey", "respond", id.as_str()]).assert().success();
    laddrr(&dir).args(["survey", "opt-out", id.as_str()]).assert().success();
    laddrr(&dir)
        .args(["survey", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("active"));

    laddrr(&dir).args(["survey", "close", id.as_str()]).assert().success();
    laddrr(&dir)
        .args(["survey", "respond", id.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("survey is closed"));
    laddrr(&dir)
        .args(["survey", "active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active survey."));
}

#[test]
fn survey_deploy_without_questions_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    laddrr(&dir)
        .args(["survey", "deploy", "--objective", "measure morale"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("questions"));
}

// ---------------------------------------------------------------------------
// laddrr feedback
// ---------------------------------------------------------------------------

#[test]
fn feedback_submit_track_resolve() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let out = stdout_json(laddrr(&dir).args([
        "--json",
        "feedback",
        "submit",
        "--subject",
        "Meetings",
        "--message",
        "Standups run 45 minutes.",
    ]));
    let id = out["trackingId"].as_str().unwrap().to_string();

    laddrr(&dir)
        .args(["feedback", "track", id.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Open]"))
        .stdout(predicate::str::contains("Submitted (Anonymous)"));

    laddrr(&dir)
        .args(["feedback", "resolve", id.as_str(), "--resolution", "Standups capped at 15 minutes."])
        .assert()
        .success()
        .stdout(predicate::str::contains("[Resolved]"));

    laddrr(&dir)
        .args(["feedback", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(&id))
        .stdout(predicate::str::contains("Resolved"));
}

#[test]
fn feedback_track_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    laddrr(&dir)
        .args(["feedback", "track", "Org-Ref-000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Org-Ref-000000"));
}

// ---------------------------------------------------------------------------
// laddrr one-on-one
// ---------------------------------------------------------------------------

#[test]
fn one_on_one_list_starts_empty() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    laddrr(&dir)
        .args(["one-on-one", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No 1-on-1 sessions recorded."));

    let json = stdout_json(laddrr(&dir).args(["--json", "one-on-one", "list", "--supervisor", "Dana"]));
    assert_eq!(json, serde_json::json!([]));
}
