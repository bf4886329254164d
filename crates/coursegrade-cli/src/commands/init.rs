//! The `coursegrade init` command.

use std::path::Path;

use anyhow::Result;

fn write_if_absent(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    println!("Created {}", path.display());
    Ok(())
}

pub fn execute() -> Result<()> {
    write_if_absent(Path::new("coursegrade.toml"), SAMPLE_CONFIG)?;
    write_if_absent(Path::new("rules/default.toml"), SAMPLE_RULES)?;
    write_if_absent(Path::new("data/courses/sample-101.json"), SAMPLE_COURSE)?;

    println!("\nNext steps:");
    println!("  1. Edit rules/default.toml with your institute's grade bands");
    println!("  2. Run: coursegrade validate --rules rules/default.toml");
    println!("  3. Run: coursegrade classify --course sample-101 --grade-type relative");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# coursegrade configuration

tenant_id = "default"
report_dir = "./coursegrade-reports"

[store]
type = "file"
root = "./data/courses"
# type = "http"
# base_url = "https://records.example.edu/api"
# api_key = "${COURSEGRADE_STORE_KEY}"

[rules]
type = "file"
dir = "./rules"
"#;

const SAMPLE_RULES: &str = r#"[rule_set]
name = "Default grade bands"
description = "Absolute bands with a relative curve"

[[rules]]
grade = "O"
scale = 10
abs_rule = "total_score >= 90"
rel_rule = "total_score >= mean + 1.5 * std_dev"

[[rules]]
grade = "A"
scale = 9
abs_rule = "80 <= total_score < 90"
rel_rule = "mean + std_dev <= total_score < mean + 1.5 * std_dev"

[[rules]]
grade = "B"
scale = 8
abs_rule = "65 <= total_score < 80"
rel_rule = "mean <= total_score < mean + std_dev"

[[rules]]
grade = "C"
scale = 7
abs_rule = "50 <= total_score < 65"
rel_rule = "mean - std_dev <= total_score < mean"

[[rules]]
grade = "F"
scale = 0
abs_rule = "total_score < 50"
rel_rule = "total_score < mean - std_dev"

[[rules]]
grade = "I"
type = "non_calculated"
"#;

const SAMPLE_COURSE: &str = r#"{
  "id": "sample-101",
  "name": "Sample Course",
  "students": [
    {
      "student_id": "s1",
      "student_name": "Asha Rao",
      "attendance_dates": {"2024-01-08": "P", "2024-01-10": "P", "2024-01-12": "P"},
      "assignments": [
        {"name": "quiz", "score": 45, "max": 50},
        {"name": "lab", "score": 28, "max": 30},
        {"name": "exam", "score": 88, "max": 100}
      ]
    },
    {
      "student_id": "s2",
      "student_name": "Ben Okafor",
      "attendance_dates": {"2024-01-08": "P", "2024-01-10": "A", "2024-01-12": "P"},
      "assignments": [
        {"name": "quiz", "score": 30, "max": 50},
        {"name": "lab", "score": 20, "max": 30},
        {"name": "exam", "score": 61, "max": 100}
      ]
    },
    {
      "student_id": "s3",
      "student_name": "Chen Wei",
      "attendance_dates": {"2024-01-08": "A", "2024-01-10": "A", "2024-01-12": "P"},
      "assignments": [
        {"name": "quiz", "score": 20, "max": 50},
        {"name": "lab", "score": 12, "max": 30},
        {"name": "exam", "score": 35, "max": 100}
      ]
    },
    {
      "student_id": "s4",
      "student_name": "Dana Levi",
      "attendance_dates": {},
      "assignments": []
    }
  ]
}
"#;
