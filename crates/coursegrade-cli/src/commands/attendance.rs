//! The `coursegrade attendance` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use coursegrade_core::attendance::AttendanceSummary;
use coursegrade_core::model::AttendanceUpdate;

use super::{load_service, print_json, read_batch, OutputFormat};

pub async fn show(course_id: String, format: OutputFormat, config_path: Option<PathBuf>) -> Result<()> {
    let (_config, service) = load_service(config_path.as_deref())?;
    let entries = service.course_attendance_percentages(&course_id).await?;

    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    let mut table = Table::new();
    table.set_header(vec!["Student ID", "Name", "Present", "Days", "Attendance"]);
    for e in &entries {
        let summary = AttendanceSummary::of(&e.attendance_record);
        table.add_row(vec![
            Cell::new(&e.student_id),
            Cell::new(&e.student_name),
            Cell::new(summary.present),
            Cell::new(summary.total),
            Cell::new(format!("{}%", e.attendance_percentage)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn student(
    student_id: String,
    course_ids: Vec<String>,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_config, service) = load_service(config_path.as_deref())?;
    let entries = service.student_attendance(&student_id, &course_ids).await?;

    if format == OutputFormat::Json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No attendance found for {student_id}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Course ID", "Course", "Present", "Days", "Attendance"]);
    for e in &entries {
        let summary = AttendanceSummary::of(&e.attendance_record);
        table.add_row(vec![
            Cell::new(&e.course_id),
            Cell::new(&e.course_name),
            Cell::new(summary.present),
            Cell::new(summary.total),
            Cell::new(format!("{:.2}%", e.attendance_percentage)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn merge(course_id: String, input: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let batch: Vec<AttendanceUpdate> = read_batch(&input)?;
    let (_config, service) = load_service(config_path.as_deref())?;
    let course = service.merge_attendance(&course_id, &batch).await?;

    println!(
        "Merged attendance for {} student(s) into {} ({} enrolled).",
        batch.len(),
        course.id,
        course.students.len()
    );
    Ok(())
}
