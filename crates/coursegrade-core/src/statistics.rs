//! Cohort statistics and grade distributions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::GradedStudent;

/// Label used in distributions for students no rule matched.
pub const UNGRADED: &str = "ungraded";

/// Mean and population standard deviation of a cohort's scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    /// Number of scores in the cohort.
    pub count: usize,
    pub mean: f64,
    /// Population (not sample) standard deviation.
    pub std_dev: f64,
}

impl CohortStats {
    /// Compute statistics for a batch of scores; `None` when it is empty.
    ///
    /// Scores are summed in ascending order, so every permutation of the
    /// same batch yields bit-identical results.
    pub fn from_scores<I>(scores: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut sorted: Vec<f64> = scores.into_iter().collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            count: sorted.len(),
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

/// Count graded students per grade label; unmatched students are counted
/// under [`UNGRADED`].
pub fn grade_distribution(results: &[GradedStudent]) -> BTreeMap<String, usize> {
    let mut distribution = BTreeMap::new();
    for r in results {
        let label = r.grade.clone().unwrap_or_else(|| UNGRADED.to_string());
        *distribution.entry(label).or_insert(0) += 1;
    }
    distribution
}
