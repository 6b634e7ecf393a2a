use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const CASE: &str = "GEMS-JHB-2024-092847";

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("caseflow.toml");
    let content = format!(
        r#"
[generator]
kind = "none"

[scheduler]
pacing = false

[store]
directory = "{}"
"#,
        dir.join("sessions").display().to_string().replace('\\', "/")
    );
    fs::write(&path, content).unwrap();
    path
}

fn caseflow(dir: &TempDir) -> Command {
    let config = write_config(dir.path());
    let mut cmd = cargo_bin_cmd!("caseflow");
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("CASEFLOW_API_KEY")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn validates_builtin_workflow() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir)
        .args(["workflow", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("12 tasks, 3 gates"));
}

#[test]
fn rejects_cyclic_workflow() {
    let dir = TempDir::new().unwrap();
    let workflow = dir.path().join("cycle.toml");
    fs::write(
        &workflow,
        r#"
[workflow]
name = "cycle"

[[tasks]]
id = "a"
name = "A"
depends_on = ["b"]

[[tasks]]
id = "b"
name = "B"
depends_on = ["a"]
"#,
    )
    .unwrap();

    caseflow(&dir)
        .arg("--workflow")
        .arg(&workflow)
        .args(["workflow", "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cyclic dependency"));
}

#[test]
fn start_stops_at_first_gate() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir)
        .args(["start", CASE, "--amount", "99148.50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("discrepancy-analyzer: awaiting_input"))
        .stdout(predicate::str::contains("query-detector: completed"));

    caseflow(&dir)
        .args(["status", CASE, "--outputs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("R 99,148.50"));
}

#[test]
fn submit_validates_required_fields() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir).args(["start", CASE]).assert().success();

    caseflow(&dir)
        .args(["submit", CASE, "discrepancy-analyzer"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Missing required fields: Billing Accuracy Confirmation",
        ));

    caseflow(&dir)
        .args([
            "submit",
            CASE,
            "discrepancy-analyzer",
            "-f",
            "Billing Accuracy Confirmation=Confirmed",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("discrepancy-analyzer: completed"))
        .stdout(predicate::str::contains("clinical-data-agent: awaiting_input"));
}

#[test]
fn reset_and_list_sessions() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir).args(["start", CASE]).assert().success();

    caseflow(&dir)
        .arg("sessions")
        .assert()
        .success()
        .stdout(predicate::str::contains(CASE));

    caseflow(&dir)
        .args(["reset", CASE])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Reset {}", CASE)));

    caseflow(&dir)
        .args(["status", CASE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No workflow session"));
}

#[test]
fn status_of_unknown_case_fails() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir)
        .args(["status", "NOPE-1", "--json"])
        .assert()
        .code(1);
}

#[test]
fn workflow_init_writes_definition() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir).args(["workflow", "init"]).assert().success();

    let written = dir.path().join(".caseflow/workflow.toml");
    let content = fs::read_to_string(&written).unwrap();
    assert!(content.contains("query-detector"));

    caseflow(&dir)
        .args(["workflow", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("level-of-care"));
}

#[test]
fn rejects_non_finite_amount() {
    let dir = TempDir::new().unwrap();
    for amount in ["inf", "NaN"] {
        caseflow(&dir)
            .args(["start", CASE, "--amount", amount])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("finite"));
    }

    caseflow(&dir)
        .args(["status", CASE])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No workflow session"));
}

#[test]
fn unreadable_session_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    caseflow(&dir).args(["start", CASE]).assert().success();

    let sessions = dir.path().join("sessions");
    let stored = fs::read_dir(&sessions)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|path| path.extension().is_some_and(|ext| ext == "json"))
        .unwrap();
    fs::write(&stored, "not json").unwrap();

    caseflow(&dir)
        .args(["start", CASE])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Corrupt session"));
    assert_eq!(fs::read_to_string(&stored).unwrap(), "not json");

    caseflow(&dir).args(["reset", CASE]).assert().success();
    caseflow(&dir)
        .args(["start", CASE])
        .assert()
        .success()
        .stdout(predicate::str::contains("discrepancy-analyzer: awaiting_input"));
}
