//! The `coursegrade classify` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use coursegrade_core::report::GradeReport;
use coursegrade_core::GradeType;

use super::{load_service, print_json, OutputFormat};

pub async fn execute(
    course_id: String,
    grade_type: GradeType,
    format: OutputFormat,
    output: Option<PathBuf>,
    save: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, service) = load_service(config_path.as_deref())?;
    let report = service.grade_report(&course_id, grade_type).await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_summary(&report),
    }

    if let Some(dir) = output.or_else(|| save.then_some(config.report_dir)) {
        let path = dir.join(report.file_name());
        report.save_json(&path)?;
        tracing::debug!(report_id = %report.id, path = %path.display(), "saved grade report");
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn print_summary(report: &GradeReport) {
    println!(
        "Course: {} ({}), {} grading",
        report.course.name, report.course.id, report.grade_type
    );
    if let Some(cohort) = &report.cohort {
        println!(
            "Cohort: {} graded, mean {:.2}, std dev {:.2}",
            cohort.count, cohort.mean, cohort.std_dev
        );
    }

    let mut table = Table::new();
    table.set_header(vec!["Student ID", "Name", "Score", "Grade"]);
    for r in &report.results {
        table.add_row(vec![
            Cell::new(&r.student_id),
            Cell::new(&r.student_name),
            Cell::new(format!("{:.2}", r.score)),
            Cell::new(r.grade.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");

    if !report.distribution.is_empty() {
        let parts: Vec<String> = report
            .distribution
            .iter()
            .map(|(grade, count)| format!("{grade}: {count}"))
            .collect();
        println!("Distribution: {}", parts.join(", "));
    }

    for s in &report.skipped {
        println!("Skipped: {} ({}): {}", s.student_id, s.student_name, s.reason);
    }
}
