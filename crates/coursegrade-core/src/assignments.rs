//! Assignment upserts into student records.

use serde::{Deserialize, Serialize};

use crate::model::{AssignmentRecord, AssignmentUpdate, CourseDocument};

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Overwrite the assignment called `name`, or append it if absent.
pub fn upsert_assignment(
    assignments: &mut Vec<AssignmentRecord>,
    name: &str,
    score: f64,
    max: f64,
) -> Upsert {
    match assignments.iter_mut().find(|a| a.name == name) {
        Some(existing) => {
            existing.score = score;
            existing.max = max;
            Upsert::Updated
        }
        None => {
            assignments.push(AssignmentRecord::new(name, score, max));
            Upsert::Inserted
        }
    }
}

/// Counts from merging an assignment batch into a course.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentMergeStats {
    pub inserted: usize,
    pub updated: usize,
    /// Student ids in the batch that are not enrolled in the course.
    pub unknown_students: Vec<String>,
}

/// Apply a batch of assignment scores in order; a later entry for the same
/// student and name overwrites an earlier one.
pub fn merge_course_assignments(
    course: &mut CourseDocument,
    batch: &[AssignmentUpdate],
) -> AssignmentMergeStats {
    let mut stats = AssignmentMergeStats::default();
    for update in batch {
        let Some(student) = course.student_mut(&update.student_id) else {
            if !stats.unknown_students.contains(&update.student_id) {
                stats.unknown_students.push(update.student_id.clone());
            }
            continue;
        };
        match upsert_assignment(&mut student.assignments, &update.name, update.score, update.max) {
            Upsert::Inserted => stats.inserted += 1,
            Upsert::Updated => stats.updated += 1,
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StudentRecord;

    fn update(student_id: &str, name: &str, score: f64, max: f64) -> AssignmentUpdate {
        AssignmentUpdate {
            student_id: student_id.into(),
            name: name.into(),
            score,
            max,
        }
    }

    #[test]
    fn upsert_overwrites_by_name() {
        let mut list = vec![AssignmentRecord::new("quiz", 5.0, 10.0)];
        assert_eq!(upsert_assignment(&mut list, "quiz", 8.0, 12.0), Upsert::Updated);
        assert_eq!(upsert_assignment(&mut list, "lab", 3.0, 5.0), Upsert::Inserted);
        assert_eq!(
            list,
            vec![
                AssignmentRecord::new("quiz", 8.0, 12.0),
                AssignmentRecord::new("lab", 3.0, 5.0)
            ]
        );
    }

    #[test]
    fn students_merge_independently() {
        let mut course = CourseDocument::new("c1", "Biology");
        course.students.push(StudentRecord::new("s1", "Asha"));
        course.students.push(StudentRecord::new("s2", "Ben"));

        let stats = merge_course_assignments(
            &mut course,
            &[
                update("s1", "quiz", 4.0, 10.0),
                update("s2", "quiz", 9.0, 10.0),
                update("s1", "quiz", 7.0, 10.0),
                update("nobody", "quiz", 1.0, 10.0),
                update("nobody", "lab", 1.0, 10.0),
            ],
        );

        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.unknown_students, vec!["nobody".to_string()]);
        assert_eq!(course.students[0].assignments, vec![AssignmentRecord::new("quiz", 7.0, 10.0)]);
        assert_eq!(course.students[1].assignments, vec![AssignmentRecord::new("quiz", 9.0, 10.0)]);
    }
}
