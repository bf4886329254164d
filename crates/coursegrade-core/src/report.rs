//! Grade report snapshots with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{Classification, GradedStudent};
use crate::model::{CourseDocument, GradeType};
use crate::scoring::SkippedStudent;
use crate::statistics::{grade_distribution, CohortStats};

/// A persisted record of one classification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub course: CourseSummary,
    pub grade_type: GradeType,
    /// Cohort statistics the run used, absent for an empty batch.
    pub cohort: Option<CohortStats>,
    pub results: Vec<GradedStudent>,
    pub skipped: Vec<SkippedStudent>,
    /// Student count per grade label.
    pub distribution: BTreeMap<String, usize>,
}

/// Summary of a course (without the student records).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: String,
    pub name: String,
    pub student_count: usize,
}

impl GradeReport {
    pub fn new(course: &CourseDocument, grade_type: GradeType, classification: Classification) -> Self {
        let distribution = grade_distribution(&classification.graded);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            course: CourseSummary {
                id: course.id.clone(),
                name: course.name.clone(),
                student_count: course.students.len(),
            },
            grade_type,
            cohort: classification.cohort,
            results: classification.graded,
            skipped: classification.skipped,
            distribution,
        }
    }

    /// File name the CLI saves this report under.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.json",
            self.course.id,
            self.grade_type,
            self.created_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradeReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}
