//! Reduction of assignment lists to percentage scores.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{AssignmentRecord, StudentRecord};

/// A student's aggregate percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub student_id: String,
    pub student_name: String,
    /// `100 * Σscore / Σmax`; not clamped, bonus marks may push it past 100.
    pub total_score: f64,
}

/// Why a student was left out of a grading pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The student has no assignments.
    MissingAssignmentData,
    /// The assignments' maximum marks do not add up to a positive total.
    ZeroMaximum,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingAssignmentData => write!(f, "no assignment data"),
            SkipReason::ZeroMaximum => write!(f, "maximum marks add up to zero"),
        }
    }
}

/// A student excluded from grading, reported alongside the graded results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStudent {
    pub student_id: String,
    pub student_name: String,
    pub reason: SkipReason,
}

/// Percentage score over a student's assignments.
pub fn total_score(assignments: &[AssignmentRecord]) -> Result<f64, SkipReason> {
    if assignments.is_empty() {
        return Err(SkipReason::MissingAssignmentData);
    }
    let (scored, max) = assignments
        .iter()
        .fold((0.0, 0.0), |(s, m), a| (s + a.score, m + a.max));
    if max <= 0.0 {
        return Err(SkipReason::ZeroMaximum);
    }
    Ok(100.0 * scored / max)
}

/// Score every student in a course, separating those without a defined
/// percentage. Input order is preserved in both outputs.
pub fn score_students(students: &[StudentRecord]) -> (Vec<StudentScore>, Vec<SkippedStudent>) {
    let mut scores = Vec::with_capacity(students.len());
    let mut skipped = Vec::new();

    for student in students {
        match total_score(&student.assignments) {
            Ok(total_score) => scores.push(StudentScore {
                student_id: student.student_id.clone(),
                student_name: student.student_name.clone(),
                total_score,
            }),
            Err(reason) => {
                tracing::warn!(
                    student_id = %student.student_id,
                    %reason,
                    "excluding student from grading"
                );
                skipped.push(SkippedStudent {
                    student_id: student.student_id.clone(),
                    student_name: student.student_name.clone(),
                    reason,
                });
            }
        }
    }

    (scores, skipped)
}
