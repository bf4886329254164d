//! Grade classification over an ordered rule set.
//!
//! Rules are scanned in definition order and the first match wins; order is
//! priority, not scale. Relative grading computes both the absolute grade
//! and a grade relative to the cohort's mean and standard deviation, then
//! keeps whichever carries the higher scale.

use serde::{Deserialize, Serialize};

use crate::error::GradingError;
use crate::expr::{Bindings, Predicate, Scope};
use crate::model::{GradeType, RawGradingRule, RuleKind};
use crate::scoring::{SkippedStudent, StudentScore};
use crate::statistics::CohortStats;

/// A grading rule with its predicates compiled.
#[derive(Debug, Clone)]
pub struct GradingRule {
    pub grade: String,
    pub scale: f64,
    pub kind: RuleKind,
    absolute: Option<Predicate>,
    relative: Option<Predicate>,
}

impl GradingRule {
    /// Compile a raw rule, validating both predicates.
    pub fn compile(raw: &RawGradingRule) -> Result<Self, GradingError> {
        let compile = |source: &Option<String>, scope: Scope| {
            source
                .as_deref()
                .map(|src| {
                    Predicate::compile(src, scope).map_err(|e| GradingError::InvalidRuleExpression {
                        grade: raw.grade.clone(),
                        expression: src.to_string(),
                        reason: e.to_string(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            grade: raw.grade.clone(),
            scale: raw.scale,
            kind: raw.kind,
            absolute: compile(&raw.absolute_predicate, Scope::Absolute)?,
            relative: compile(&raw.relative_predicate, Scope::Relative)?,
        })
    }

    pub fn absolute_predicate(&self) -> Option<&Predicate> {
        self.absolute.as_ref()
    }

    pub fn relative_predicate(&self) -> Option<&Predicate> {
        self.relative.as_ref()
    }

    fn matches_absolute(&self, total_score: f64) -> bool {
        self.kind == RuleKind::Calculated
            && self
                .absolute
                .as_ref()
                .is_some_and(|p| p.evaluate(&Bindings::score(total_score)))
    }

    fn matches_relative(&self, total_score: f64, cohort: &CohortStats) -> bool {
        let bindings = Bindings {
            total_score,
            mean: cohort.mean,
            std_dev: cohort.std_dev,
        };
        self.kind == RuleKind::Calculated
            && self
                .relative
                .as_ref()
                .is_some_and(|p| p.evaluate(&bindings))
    }
}

/// One student's classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedStudent {
    pub student_id: String,
    pub student_name: String,
    pub score: f64,
    /// `None` when no rule matched.
    pub grade: Option<String>,
}

/// Outcome of grading one course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Graded students, in course order.
    pub graded: Vec<GradedStudent>,
    /// Students left out of the pass, with the reason.
    pub skipped: Vec<SkippedStudent>,
    /// Statistics of the graded cohort; `None` when nobody was graded.
    pub cohort: Option<CohortStats>,
}

/// An ordered, validated rule set.
#[derive(Debug, Clone, Default)]
pub struct GradingSystem {
    rules: Vec<GradingRule>,
}

impl GradingSystem {
    /// Compile every rule up front; the first invalid expression fails the
    /// whole set.
    pub fn from_definitions(definitions: &[RawGradingRule]) -> Result<Self, GradingError> {
        let rules = definitions
            .iter()
            .map(GradingRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[GradingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule whose absolute predicate holds.
    pub fn absolute_grade(&self, total_score: f64) -> Option<&GradingRule> {
        self.rules.iter().find(|r| r.matches_absolute(total_score))
    }

    /// First rule whose relative predicate holds for the cohort.
    pub fn relative_grade(&self, total_score: f64, cohort: &CohortStats) -> Option<&GradingRule> {
        self.rules
            .iter()
            .find(|r| r.matches_relative(total_score, cohort))
    }

    /// Resolve one student's grade.
    ///
    /// In relative mode the relative match replaces the absolute one only
    /// when its scale is strictly higher.
    pub fn grade(
        &self,
        grade_type: GradeType,
        total_score: f64,
        cohort: &CohortStats,
    ) -> Option<&GradingRule> {
        let absolute = self.absolute_grade(total_score);
        if grade_type == GradeType::Absolute {
            return absolute;
        }
        match (absolute, self.relative_grade(total_score, cohort)) {
            (Some(abs), Some(rel)) if rel.scale > abs.scale => Some(rel),
            (Some(abs), _) => Some(abs),
            (None, rel) => rel,
        }
    }

    /// Grade a cohort. Each student's grade depends only on their own score
    /// and the cohort statistics, never on their position in `scores`.
    pub fn classify(
        &self,
        grade_type: GradeType,
        scores: &[StudentScore],
    ) -> (Vec<GradedStudent>, Option<CohortStats>) {
        let cohort = CohortStats::from_scores(scores.iter().map(|s| s.total_score));
        let Some(stats) = cohort else {
            return (Vec::new(), None);
        };
        if self.rules.is_empty() {
            return (Vec::new(), cohort);
        }

        let graded = scores
            .iter()
            .map(|s| {
                let grade = self
                    .grade(grade_type, s.total_score, &stats)
                    .map(|r| r.grade.clone());
                tracing::debug!(
                    student_id = %s.student_id,
                    score = s.total_score,
                    grade = grade.as_deref().unwrap_or("-"),
                    "graded student"
                );
                GradedStudent {
                    student_id: s.student_id.clone(),
                    student_name: s.student_name.clone(),
                    score: s.total_score,
                    grade,
                }
            })
            .collect();

        (graded, cohort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(grade: &str, scale: f64, abs: Option<&str>, rel: Option<&str>) -> RawGradingRule {
        RawGradingRule {
            grade: grade.into(),
            scale,
            absolute_predicate: abs.map(str::to_string),
            relative_predicate: rel.map(str::to_string),
            kind: RuleKind::Calculated,
        }
    }

    fn standard_rules() -> Vec<RawGradingRule> {
        vec![
            rule(
                "A+",
                10.0,
                Some("90 <= total_score <= 100"),
                Some("100 >= total_score >= mean + 1.5*std_dev"),
            ),
            rule(
                "A",
                9.0,
                Some("80 <= total_score < 90"),
                Some("mean + 1.5*std_dev > total_score >= mean + 0.5*std_dev"),
            ),
            rule(
                "B",
                8.0,
                Some("70 <= total_score < 80"),
                Some("mean + 0.5*std_dev > total_score >= mean - 0.5*std_dev"),
            ),
            rule(
                "C",
                7.0,
                Some("60 <= total_score < 70"),
                Some("mean - 0.5*std_dev > total_score >= mean - 1.0*std_dev"),
            ),
            rule(
                "F",
                0.0,
                Some("0 <= total_score < 60"),
                Some("0 <= total_score < mean - 1.0*std_dev"),
            ),
            RawGradingRule {
                grade: "I".into(),
                scale: 0.0,
                absolute_predicate: None,
                relative_predicate: None,
                kind: RuleKind::NonCalculated,
            },
        ]
    }

    fn score(id: &str, total_score: f64) -> StudentScore {
        StudentScore {
            student_id: id.into(),
            student_name: id.to_uppercase(),
            total_score,
        }
    }

    fn stats(mean: f64, std_dev: f64) -> CohortStats {
        CohortStats {
            count: 10,
            mean,
            std_dev,
        }
    }

    #[test]
    fn absolute_first_match_wins_in_definition_order() {
        let system = GradingSystem::from_definitions(&[
            rule("Pass", 1.0, Some("total_score >= 40"), None),
            rule("Distinction", 5.0, Some("total_score >= 75"), None),
        ])
        .unwrap();
        assert_eq!(system.absolute_grade(90.0).unwrap().grade, "Pass");
    }

    #[test]
    fn absolute_no_match_is_none() {
        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        assert!(system.absolute_grade(120.0).is_none());
        assert!(system.absolute_grade(-1.0).is_none());
    }

    #[test]
    fn relative_prefers_higher_scale() {
        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        // 75 is absolute "B" (8); against mean 60 / std 12 it is relative "A" (9).
        let cohort = stats(60.0, 12.0);
        assert_eq!(system.absolute_grade(75.0).unwrap().grade, "B");
        assert_eq!(system.relative_grade(75.0, &cohort).unwrap().grade, "A");
        assert_eq!(
            system.grade(GradeType::Relative, 75.0, &cohort).unwrap().grade,
            "A"
        );
        assert_eq!(
            system.grade(GradeType::Absolute, 75.0, &cohort).unwrap().grade,
            "B"
        );
    }

    #[test]
    fn relative_keeps_absolute_when_it_is_better() {
        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        // Strong cohort: 85 is absolute "A" but only relative "C".
        let cohort = stats(88.0, 5.0);
        assert_eq!(system.relative_grade(85.0, &cohort).unwrap().grade, "C");
        assert_eq!(
            system.grade(GradeType::Relative, 85.0, &cohort).unwrap().grade,
            "A"
        );
    }

    #[test]
    fn relative_uses_whichever_side_matched() {
        let system = GradingSystem::from_definitions(&[
            rule("Top", 5.0, None, Some("total_score >= mean")),
            rule("Floor", 1.0, Some("total_score < 10"), None),
        ])
        .unwrap();
        let cohort = stats(50.0, 5.0);
        assert_eq!(
            system.grade(GradeType::Relative, 60.0, &cohort).unwrap().grade,
            "Top"
        );
        assert_eq!(
            system.grade(GradeType::Relative, 5.0, &cohort).unwrap().grade,
            "Floor"
        );
        assert!(system.grade(GradeType::Relative, 30.0, &cohort).is_none());
    }

    #[test]
    fn equal_scale_tie_keeps_absolute() {
        let system = GradingSystem::from_definitions(&[
            rule("F", 0.0, Some("total_score < 40"), None),
            rule("I", 0.0, None, Some("total_score < mean")),
        ])
        .unwrap();
        let resolved = system
            .grade(GradeType::Relative, 20.0, &stats(50.0, 10.0))
            .unwrap();
        assert_eq!(resolved.grade, "F");
    }

    #[test]
    fn non_calculated_rules_are_never_matched() {
        let system = GradingSystem::from_definitions(&[RawGradingRule {
            grade: "DT".into(),
            scale: 0.0,
            absolute_predicate: Some("total_score >= 0".into()),
            relative_predicate: Some("total_score >= 0".into()),
            kind: RuleKind::NonCalculated,
        }])
        .unwrap();
        assert!(system
            .grade(GradeType::Relative, 50.0, &stats(50.0, 1.0))
            .is_none());
    }

    #[test]
    fn invalid_expression_fails_the_whole_set() {
        let mut rules = standard_rules();
        rules.push(rule("X", 1.0, Some("total_score > 1"), Some("eval('1')")));
        let err = GradingSystem::from_definitions(&rules).unwrap_err();
        match err {
            GradingError::InvalidRuleExpression {
                grade, expression, ..
            } => {
                assert_eq!(grade, "X");
                assert_eq!(expression, "eval('1')");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mean_in_absolute_predicate_is_rejected_at_load() {
        let err = GradingSystem::from_definitions(&[rule(
            "A",
            9.0,
            Some("total_score > mean"),
            None,
        )])
        .unwrap_err();
        assert!(err.to_string().contains("not available in absolute predicates"));
    }

    #[test]
    fn empty_rules_or_empty_batch_yield_nothing() {
        let empty = GradingSystem::default();
        let (graded, cohort) = empty.classify(GradeType::Relative, &[score("a", 50.0)]);
        assert!(graded.is_empty());
        assert!(cohort.is_some());

        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        let (graded, cohort) = system.classify(GradeType::Absolute, &[]);
        assert!(graded.is_empty());
        assert!(cohort.is_none());
    }

    #[test]
    fn single_student_cohort_is_defined() {
        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        let (graded, cohort) = system.classify(GradeType::Relative, &[score("solo", 55.0)]);
        assert_eq!(cohort.unwrap().std_dev, 0.0);
        // Relative: 55 >= mean + 1.5*0 and <= 100 → "A+".
        assert_eq!(graded[0].grade.as_deref(), Some("A+"));
    }

    #[test]
    fn classification_is_order_independent() {
        let system = GradingSystem::from_definitions(&standard_rules()).unwrap();
        let batch: Vec<StudentScore> = [
            64.53, 42.69, 54.53, 65.12, 40.36, 39.06, 47.23, 38.91, 60.03, 54.13, 40.97, 35.73,
            45.01, 51.92, 26.79, 51.19, 33.84, 50.70, 68.03, 37.00,
        ]
        .iter()
        .enumerate()
        .map(|(i, s)| score(&format!("s{i}"), *s))
        .collect();

        let mut reversed = batch.clone();
        reversed.reverse();
        let mut rotated = batch.clone();
        rotated.rotate_left(7);

        for grade_type in [GradeType::Absolute, GradeType::Relative] {
            let sorted = |mut v: Vec<GradedStudent>| {
                v.sort_by(|a, b| a.student_id.cmp(&b.student_id));
                v
            };
            let (base, _) = system.classify(grade_type, &batch);
            let (rev, _) = system.classify(grade_type, &reversed);
            let (rot, _) = system.classify(grade_type, &rotated);
            assert_eq!(sorted(base.clone()), sorted(rev));
            assert_eq!(sorted(base), sorted(rot));
        }
    }
}
