// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end CLI checks: exit codes, schedule output, replay.
#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("squares-cli").unwrap()
}

fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn plan_writes_a_replayable_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let start = write(&dir, "start.txt", "111\n");
    let goal = write(&dir, "goal.txt", "0111\n");
    let out = dir.path().join("schedule.json");

    cli()
        .args(["plan"])
        .arg(&start)
        .arg(&goal)
        .arg("--out")
        .arg(&out)
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("done: 1 steps"));

    cli()
        .args(["replay"])
        .arg(&start)
        .arg(&out)
        .arg("--expect")
        .arg(&goal)
        .assert()
        .success()
        .stdout(predicate::str::contains("matches expected goal"));
}

#[test]
fn unequal_counts_exit_with_code_three() {
    let dir = tempfile::tempdir().unwrap();
    let start = write(&dir, "start.txt", "111\n");
    let goal = write(&dir, "goal.txt", "11\n");

    cli()
        .args(["plan"])
        .arg(&start)
        .arg(&goal)
        .assert()
        .code(3);
}

#[test]
fn malformed_grid_exits_with_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(&dir, "bad.txt", "1x1\n");

    cli()
        .args(["verify"])
        .arg(&bad)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn disconnected_grid_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let split = write(&dir, "split.txt", "101\n");

    cli()
        .args(["verify"])
        .arg(&split)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not 4-connected"));
}

#[test]
fn verify_reports_count_and_perimeter() {
    let dir = tempfile::tempdir().unwrap();
    let ok = write(&dir, "ok.txt", "11\n11\n");

    cli()
        .args(["verify"])
        .arg(&ok)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: 4 modules, perimeter 8"));
}
