//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn coursegrade(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("coursegrade").unwrap();
    cmd.current_dir(dir)
        .env_remove("COURSEGRADE_TENANT_ID")
        .env_remove("COURSEGRADE_STORE_KEY");
    cmd
}

/// A temp directory initialised with the sample config, rules and course.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    coursegrade(dir.path()).arg("init").assert().success();
    dir
}

fn classify_json(dir: &Path, grade_type: &str) -> serde_json::Value {
    let output = coursegrade(dir)
        .args(["classify", "--course", "sample-101", "--format", "json", "--grade-type", grade_type])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn grade_of<'a>(report: &'a serde_json::Value, student_id: &str) -> Option<&'a str> {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["student_id"] == student_id)
        .and_then(|r| r["grade"].as_str())
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    coursegrade(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created coursegrade.toml"))
        .stdout(predicate::str::contains("Created rules/default.toml"));

    assert!(dir.path().join("coursegrade.toml").exists());
    assert!(dir.path().join("rules/default.toml").exists());
    assert!(dir.path().join("data/courses/sample-101.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = workspace();

    coursegrade(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn validate_sample_rules() {
    let dir = workspace();

    coursegrade(dir.path())
        .args(["validate", "--rules", "rules/default.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default grade bands (6 rules)"))
        .stdout(predicate::str::contains("All rules valid"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("rules.toml"),
        r#"
[[rules]]
grade = "A"
scale = 9
abs_rule = "total_score >= 80"

[[rules]]
grade = "A"
scale = 8
"#,
    )
    .unwrap();

    coursegrade(dir.path())
        .args(["validate", "--rules", "rules.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate grade label"))
        .stdout(predicate::str::contains("2 warning(s) found"));
}

#[test]
fn validate_rejects_unsafe_expressions() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("rules.toml"),
        "[[rules]]\ngrade = \"X\"\nscale = 1\nabs_rule = \"__import__('os').getcwd()\"\n",
    )
    .unwrap();

    coursegrade(dir.path())
        .args(["validate", "--rules", "rules.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid rule expression for grade 'X'"));
}

#[test]
fn validate_nonexistent_file() {
    let dir = TempDir::new().unwrap();
    coursegrade(dir.path())
        .args(["validate", "--rules", "nonexistent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn classify_table_lists_graded_and_skipped() {
    let dir = workspace();

    coursegrade(dir.path())
        .args(["classify", "--course", "sample-101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Asha Rao"))
        .stdout(predicate::str::contains("89.44"))
        .stdout(predicate::str::contains("Skipped: s4 (Dana Levi): no assignment data"));
}

#[test]
fn classify_absolute_and_relative() {
    let dir = workspace();

    let absolute = classify_json(dir.path(), "absolute");
    assert_eq!(grade_of(&absolute, "s1"), Some("A"));
    assert_eq!(grade_of(&absolute, "s2"), Some("C"));
    assert_eq!(grade_of(&absolute, "s3"), Some("F"));
    assert_eq!(absolute["skipped"][0]["reason"], "missing_assignment_data");
    assert_eq!(absolute["course"]["student_count"], 4);

    let relative = classify_json(dir.path(), "relative");
    assert_eq!(relative["grade_type"], "relative");
    assert_eq!(relative["cohort"]["count"], 3);
    assert_eq!(grade_of(&relative, "s1"), Some("A"));
}

#[test]
fn classify_saves_report() {
    let dir = workspace();

    coursegrade(dir.path())
        .args(["classify", "--course", "sample-101", "--save"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Report saved to"));

    let saved: Vec<_> = std::fs::read_dir(dir.path().join("coursegrade-reports"))
        .unwrap()
        .collect();
    assert_eq!(saved.len(), 1);
}

#[test]
fn debug_logs_go_to_stderr() {
    let dir = workspace();

    let output = coursegrade(dir.path())
        .env("RUST_LOG", "coursegrade=debug")
        .args(["classify", "--course", "sample-101", "--format", "json", "--save"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("loaded configuration"));
    assert!(stderr.contains("saved grade report"));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["course"]["id"], "sample-101");
}

#[test]
fn classify_unknown_course_fails() {
    let dir = workspace();
    coursegrade(dir.path())
        .args(["classify", "--course", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("course not found: nope"));
}

#[test]
fn classify_rejects_unknown_grade_type() {
    let dir = workspace();
    coursegrade(dir.path())
        .args(["classify", "--course", "sample-101", "--grade-type", "curved"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown grade type"));
}

#[test]
fn attendance_show_rounds_percentages() {
    let dir = workspace();
    coursegrade(dir.path())
        .args(["attendance", "show", "--course", "sample-101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("100%"))
        .stdout(predicate::str::contains("67%"))
        .stdout(predicate::str::contains("33%"));
}

#[test]
fn attendance_merge_keeps_existing_marks() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("batch.json"),
        r#"[{"student_id": "s2", "attendance": [
            {"date": "2024-01-10", "status": "P"},
            {"date": "2024-01-15", "status": "P"}
        ]}]"#,
    )
    .unwrap();

    coursegrade(dir.path())
        .args(["attendance", "merge", "--course", "sample-101", "--input", "batch.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged attendance"));

    let output = coursegrade(dir.path())
        .args(["attendance", "show", "--course", "sample-101", "--format", "json"])
        .output()
        .unwrap();
    let entries: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let s2 = &entries[1];
    assert_eq!(s2["student_id"], "s2");
    assert_eq!(s2["attendance_record"]["2024-01-10"], "A");
    assert_eq!(s2["attendance_record"]["2024-01-15"], "P");
    assert_eq!(s2["attendance_percentage"], 75);
}

#[test]
fn attendance_student_view_is_unrounded() {
    let dir = workspace();
    coursegrade(dir.path())
        .args([
            "attendance",
            "student",
            "--student",
            "s2",
            "--courses",
            "sample-101,missing-course",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample Course"))
        .stdout(predicate::str::contains("66.67%"))
        .stdout(predicate::str::contains("missing-course").not());
}

#[test]
fn assignments_merge_changes_grades() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("scores.json"),
        r#"[{"student_id": "s2", "name": "exam", "score": 90, "max": 100}]"#,
    )
    .unwrap();

    coursegrade(dir.path())
        .args(["assignments", "merge", "--course", "sample-101", "--input", "scores.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged 1 assignment score(s) into sample-101"));

    let report = classify_json(dir.path(), "absolute");
    assert_eq!(grade_of(&report, "s2"), Some("B"));
}

#[test]
fn explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    coursegrade(dir.path())
        .args(["classify", "--course", "x", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    coursegrade(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Course grading and attendance tools"));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    coursegrade(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("coursegrade"));
}
