//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `multibalance` binary end-to-end on a
//! small two-group sample file.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("multibalance").unwrap()
}

/// Two groups with different error profiles, 200 rows.
fn write_samples(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let mut out = String::from("y_true,y_pred,group\n");
    let tables = [("A", [[45, 5], [10, 40]]), ("B", [[35, 15], [20, 30]])];
    let classes = ["neg", "pos"];
    for (group, table) in tables {
        for i in 0..2 {
            for j in 0..2 {
                for _ in 0..table[i][j] {
                    out.push_str(&format!("{},{},{}\n", classes[i], classes[j], group));
                }
            }
        }
    }
    std::fs::write(&path, out).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("adjust"))
        .stdout(predicate::str::contains("summary"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("multibalance"));
}

#[test]
fn config_prints_default_json() {
    cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"goal\": \"odds\""))
        .stdout(predicate::str::contains("\"loss\": \"macro\""))
        .stdout(predicate::str::contains("\"y_true_column\""));
}

// ---------------------------------------------------------------------------
// Adjust subcommand
// ---------------------------------------------------------------------------

#[test]
fn adjust_without_input_errors() {
    cmd().arg("adjust").assert().failure();
}

#[test]
fn adjust_nonexistent_input_errors() {
    cmd()
        .args(["adjust", "/nonexistent/samples.csv"])
        .assert()
        .failure();
}

#[test]
fn adjust_rejects_unknown_goal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_samples(dir.path(), "samples.csv");
    cmd()
        .arg("adjust")
        .arg(&input)
        .args(["--goal", "fair"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn adjust_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_samples(dir.path(), "samples.csv");
    let predictions = dir.path().join("adjusted.csv");
    let summary = dir.path().join("summary.json");
    let report = dir.path().join("report.html");

    cmd()
        .arg("adjust")
        .arg(&input)
        .args(["--goal", "odds", "--loss", "micro", "--seed", "7"])
        .arg("--predictions")
        .arg(&predictions)
        .arg("--summary-json")
        .arg(&summary)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("goal=odds loss=micro"))
        .stdout(predicate::str::contains("Group 'A'"));

    let written = std::fs::read_to_string(&predictions).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("y_true,y_pred,group,y_adjusted,p_neg,p_pos"));
    assert_eq!(lines.count(), 200);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["adjustment"]["goal"], "odds");
    assert!((json["objective"].as_f64().unwrap() - 0.35).abs() < 1e-6);

    let html = std::fs::read_to_string(&report).unwrap();
    assert!(html.contains("<html>"));
}

#[test]
fn adjust_with_same_seed_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_samples(dir.path(), "samples.csv");
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");
    for out in [&first, &second] {
        cmd()
            .arg("adjust")
            .arg(&input)
            .args(["--seed", "11", "--predictions"])
            .arg(out)
            .assert()
            .success();
    }
    assert_eq!(
        std::fs::read_to_string(&first).unwrap(),
        std::fs::read_to_string(&second).unwrap()
    );
}

#[test]
fn adjust_reads_config_file_and_custom_columns() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("samples.tsv");
    std::fs::write(&input, "truth\tpred\trace\na\ta\tx\nb\tb\tx\na\tb\ty\nb\ta\ty\n").unwrap();
    let config = dir.path().join("run.json");
    std::fs::write(
        &config,
        format!(
            r#"{{"input": "{}", "columns": {{"y_true_column": "truth", "y_pred_column": "pred", "group_column": "race"}}, "balance": {{"goal": "strict"}}}}"#,
            input.display()
        ),
    )
    .unwrap();

    cmd()
        .args(["adjust", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("goal=strict loss=macro"));
}

#[test]
fn adjust_missing_column_errors() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_samples(dir.path(), "samples.csv");
    cmd()
        .arg("adjust")
        .arg(&input)
        .args(["--group-col", "race"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Summary subcommand
// ---------------------------------------------------------------------------

#[test]
fn summary_reports_unadjusted_state() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_samples(dir.path(), "samples.csv");
    cmd()
        .arg("summary")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Unadjusted"))
        .stdout(predicate::str::contains("0/1 loss 0.2500"));
}
