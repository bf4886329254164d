//! Course document model.
//!
//! These types mirror the JSON course documents kept in the record store.
//! Fields the core does not interpret (partition keys, course properties,
//! registration numbers) are carried in `extra` so a read-modify-write
//! cycle never drops them.

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One course and its enrolled students, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDocument {
    /// Course identifier (also the document key).
    pub id: String,
    /// Display name of the course.
    #[serde(default)]
    pub name: String,
    /// Enrolled students.
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    /// Opaque concurrency token issued by the store on every write.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Fields not interpreted by the core.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CourseDocument {
    /// Create an empty course document with no concurrency token.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            students: Vec::new(),
            etag: None,
            extra: Map::new(),
        }
    }

    pub fn student(&self, student_id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.student_id == student_id)
    }

    pub fn student_mut(&mut self, student_id: &str) -> Option<&mut StudentRecord> {
        self.students.iter_mut().find(|s| s.student_id == student_id)
    }
}

/// A student's entry inside a course document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    /// Attendance by date key.
    #[serde(rename = "attendance_dates", default)]
    pub attendance: AttendanceRecord,
    /// Graded assignments, in insertion order.
    #[serde(default)]
    pub assignments: Vec<AssignmentRecord>,
    /// Fields not interpreted by the core.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StudentRecord {
    pub fn new(student_id: impl Into<String>, student_name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            student_name: student_name.into(),
            attendance: AttendanceRecord::default(),
            assignments: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// A single graded piece of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub name: String,
    pub score: f64,
    pub max: f64,
}

impl AssignmentRecord {
    pub fn new(name: impl Into<String>, score: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            score,
            max,
        }
    }
}

/// Attendance mark for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[serde(rename = "P", alias = "Present", alias = "present")]
    Present,
    #[serde(rename = "A", alias = "Absent", alias = "absent")]
    Absent,
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "P"),
            AttendanceStatus::Absent => write!(f, "A"),
        }
    }
}

/// Date key → status. Keys are opaque strings and unique.
///
/// Serialized as a JSON object. On read, the legacy shape (a list of
/// single-entry objects) is also accepted; a date repeated in such a list
/// keeps its first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AttendanceRepr")]
pub struct AttendanceRecord(BTreeMap<String, AttendanceStatus>);

#[derive(Deserialize)]
#[serde(untagged)]
enum AttendanceRepr {
    Map(BTreeMap<String, AttendanceStatus>),
    List(Vec<BTreeMap<String, AttendanceStatus>>),
}

impl From<AttendanceRepr> for AttendanceRecord {
    fn from(repr: AttendanceRepr) -> Self {
        match repr {
            AttendanceRepr::Map(map) => AttendanceRecord(map),
            AttendanceRepr::List(entries) => {
                let mut record = AttendanceRecord::default();
                for entry in entries {
                    for (date, status) in entry {
                        record.insert_if_absent(date, status);
                    }
                }
                record
            }
        }
    }
}

impl AttendanceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: &str) -> Option<AttendanceStatus> {
        self.0.get(date).copied()
    }

    /// Record `status` for `date` unless the date is already marked.
    /// Returns `true` if the entry was added.
    pub fn insert_if_absent(&mut self, date: String, status: AttendanceStatus) -> bool {
        match self.0.entry(date) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(status);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, date: &str) -> bool {
        self.0.contains_key(date)
    }

    /// Number of distinct dates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AttendanceStatus)> {
        self.0.iter().map(|(d, s)| (d.as_str(), *s))
    }
}

impl<K: Into<String>> FromIterator<(K, AttendanceStatus)> for AttendanceRecord {
    /// Builds a record keeping the first status seen for each date.
    fn from_iter<I: IntoIterator<Item = (K, AttendanceStatus)>>(iter: I) -> Self {
        let mut record = AttendanceRecord::default();
        for (date, status) in iter {
            record.insert_if_absent(date.into(), status);
        }
        record
    }
}

/// Whether a grading rule takes part in automatic classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Assigned by evaluating the rule's predicates.
    #[default]
    Calculated,
    /// Assigned manually (e.g. incomplete, detained); never evaluated.
    NonCalculated,
}

/// A grading rule as delivered by institute configuration, before its
/// predicates are compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGradingRule {
    /// Grade label (e.g. "A+").
    pub grade: String,
    /// Rank of the grade; higher is better.
    #[serde(default)]
    pub scale: f64,
    /// Threshold over `total_score`.
    #[serde(
        rename = "abs_rule",
        alias = "absolute_predicate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub absolute_predicate: Option<String>,
    /// Threshold over `total_score`, `mean` and `std_dev`.
    #[serde(
        rename = "rel_rule",
        alias = "relative_predicate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relative_predicate: Option<String>,
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: RuleKind,
}

/// Grading mode for a classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeType {
    /// Fixed thresholds on each student's own score.
    Absolute,
    /// The better of the absolute grade and a grade relative to the cohort.
    Relative,
}

impl fmt::Display for GradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeType::Absolute => write!(f, "absolute"),
            GradeType::Relative => write!(f, "relative"),
        }
    }
}

impl FromStr for GradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "absolute" | "abs" => Ok(GradeType::Absolute),
            "relative" | "rel" => Ok(GradeType::Relative),
            other => Err(format!("unknown grade type: {other}")),
        }
    }
}

/// One attendance observation in a merge batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceObservation {
    pub date: String,
    pub status: AttendanceStatus,
}

/// Attendance observations for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceUpdate {
    #[serde(alias = "id")]
    pub student_id: String,
    #[serde(alias = "attendance", default)]
    pub observations: Vec<AttendanceObservation>,
}

/// One assignment score for one student in a merge batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentUpdate {
    pub student_id: String,
    pub name: String,
    pub score: f64,
    pub max: f64,
}
