//! Attendance merging and percentages.
//!
//! Merges are append-only per date: once a date is marked for a student a
//! later merge cannot change it. Percentages come in two presentations
//! built from the same counts: rounded to a whole number for course-wide
//! views, unrounded for a single student's view.

use serde::{Deserialize, Serialize};

use crate::model::{AttendanceObservation, AttendanceRecord, AttendanceStatus, AttendanceUpdate, CourseDocument};

/// Present and total counts for one attendance record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    /// Number of distinct dates.
    pub total: usize,
}

impl AttendanceSummary {
    pub fn of(record: &AttendanceRecord) -> Self {
        let present = record
            .iter()
            .filter(|(_, status)| *status == AttendanceStatus::Present)
            .count();
        Self {
            present,
            total: record.len(),
        }
    }

    /// `present / total * 100`, or 0 when no dates are recorded.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.present as f64 / self.total as f64 * 100.0
    }

    /// [`percentage`](Self::percentage) rounded half away from zero.
    pub fn rounded_percentage(&self) -> u32 {
        self.percentage().round() as u32
    }
}

/// Counts from merging observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceMergeStats {
    /// Dates newly recorded.
    pub added: usize,
    /// Observations dropped because the date was already marked.
    pub ignored: usize,
    /// Student ids in the batch that are not enrolled in the course.
    pub unknown_students: Vec<String>,
}

/// Add observations for dates not yet present; existing dates are kept.
pub fn merge_observations(
    record: &mut AttendanceRecord,
    observations: &[AttendanceObservation],
) -> AttendanceMergeStats {
    let mut stats = AttendanceMergeStats::default();
    for obs in observations {
        if record.insert_if_absent(obs.date.clone(), obs.status) {
            stats.added += 1;
        } else {
            stats.ignored += 1;
        }
    }
    stats
}

/// Merge a batch of per-student observations into a course document.
pub fn merge_course_attendance(
    course: &mut CourseDocument,
    batch: &[AttendanceUpdate],
) -> AttendanceMergeStats {
    let mut total = AttendanceMergeStats::default();
    for update in batch {
        let Some(student) = course.student_mut(&update.student_id) else {
            total.unknown_students.push(update.student_id.clone());
            continue;
        };
        let stats = merge_observations(&mut student.attendance, &update.observations);
        total.added += stats.added;
        total.ignored += stats.ignored;
    }
    total
}

/// A student's attendance within a course-wide view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAttendanceEntry {
    pub student_id: String,
    pub student_name: String,
    pub attendance_record: AttendanceRecord,
    /// Whole-number percentage.
    pub attendance_percentage: u32,
}

/// Attendance of every student in a course, rounded percentages.
pub fn course_attendance(course: &CourseDocument) -> Vec<CourseAttendanceEntry> {
    course
        .students
        .iter()
        .map(|s| CourseAttendanceEntry {
            student_id: s.student_id.clone(),
            student_name: s.student_name.clone(),
            attendance_record: s.attendance.clone(),
            attendance_percentage: AttendanceSummary::of(&s.attendance).rounded_percentage(),
        })
        .collect()
}

/// One course's attendance within a single student's view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentAttendanceEntry {
    pub course_id: String,
    pub course_name: String,
    pub attendance_record: AttendanceRecord,
    /// Unrounded percentage.
    pub attendance_percentage: f64,
}

/// The student's attendance in `course`, if they are enrolled.
pub fn student_attendance_in(course: &CourseDocument, student_id: &str) -> Option<StudentAttendanceEntry> {
    let student = course.student(student_id)?;
    Some(StudentAttendanceEntry {
        course_id: course.id.clone(),
        course_name: course.name.clone(),
        attendance_record: student.attendance.clone(),
        attendance_percentage: AttendanceSummary::of(&student.attendance).percentage(),
    })
}
