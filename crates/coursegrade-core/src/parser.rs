//! TOML grading-rule file parser.
//!
//! Loads an institute's rule set from a TOML file of `[[rules]]` tables
//! and checks it for suspicious but non-fatal definitions.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{RawGradingRule, RuleKind};

#[derive(Debug, Deserialize)]
struct TomlRuleFile {
    #[serde(default)]
    rule_set: TomlRuleSetHeader,
    #[serde(default)]
    rules: Vec<RawGradingRule>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlRuleSetHeader {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
}

/// A parsed rule file. Rules keep their file order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFile {
    pub name: Option<String>,
    pub description: String,
    pub rules: Vec<RawGradingRule>,
}

/// Parse a rule file from disk.
pub fn parse_rule_file(path: &Path) -> Result<RuleFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file: {}", path.display()))?;

    parse_rule_file_str(&content, path)
}

/// Parse rule file contents; `source_path` is only used in error messages.
pub fn parse_rule_file_str(content: &str, source_path: &Path) -> Result<RuleFile> {
    let parsed: TomlRuleFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    Ok(RuleFile {
        name: parsed.rule_set.name,
        description: parsed.rule_set.description,
        rules: parsed.rules,
    })
}

/// A warning from rule set validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Grade label of the offending rule.
    pub grade: String,
    pub message: String,
}

/// Check a rule set for definitions that load but are probably mistakes.
pub fn validate_rule_set(rules: &[RawGradingRule]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_grades = HashSet::new();
    for rule in rules {
        if !seen_grades.insert(rule.grade.as_str()) {
            warnings.push(ValidationWarning {
                grade: rule.grade.clone(),
                message: format!("duplicate grade label: {}", rule.grade),
            });
        }
    }

    let mut seen_scales = HashSet::new();
    for rule in rules {
        let has_predicate = rule.absolute_predicate.is_some() || rule.relative_predicate.is_some();
        match rule.kind {
            RuleKind::Calculated => {
                if !has_predicate {
                    warnings.push(ValidationWarning {
                        grade: rule.grade.clone(),
                        message: "calculated rule has no predicate and can never match".into(),
                    });
                }
                // -0.0 and 0.0 are the same scale
                if !seen_scales.insert((rule.scale + 0.0).to_bits()) {
                    warnings.push(ValidationWarning {
                        grade: rule.grade.clone(),
                        message: format!("scale {} is shared with another calculated rule", rule.scale),
                    });
                }
            }
            RuleKind::NonCalculated => {
                if has_predicate {
                    warnings.push(ValidationWarning {
                        grade: rule.grade.clone(),
                        message: "predicates on a non_calculated rule are ignored".into(),
                    });
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[rule_set]
name = "Ten point scale"
description = "Absolute bands with relative uplift"

[[rules]]
grade = "O"
scale = 10
abs_rule = "total_score >= 90"
rel_rule = "total_score >= mean + 1.5 * std_dev"

[[rules]]
grade = "A+"
scale = 9
abs_rule = "80 <= total_score < 90"
rel_rule = "mean + std_dev <= total_score < mean + 1.5 * std_dev"

[[rules]]
grade = "F"
scale = 0
abs_rule = "total_score < 40"

[[rules]]
grade = "I"
type = "non_calculated"
"#;

    #[test]
    fn parse_valid_toml() {
        let file = parse_rule_file_str(VALID_TOML, &PathBuf::from("rules.toml")).unwrap();
        assert_eq!(file.name.as_deref(), Some("Ten point scale"));
        assert_eq!(file.rules.len(), 4);
        assert_eq!(file.rules[0].grade, "O");
        assert_eq!(file.rules[1].absolute_predicate.as_deref(), Some("80 <= total_score < 90"));
        assert!(file.rules[2].relative_predicate.is_none());
        assert_eq!(file.rules[3].kind, RuleKind::NonCalculated);
        assert!(validate_rule_set(&file.rules).is_empty());
    }

    #[test]
    fn header_is_optional() {
        let toml = r#"
[[rules]]
grade = "P"
scale = 1
abs_rule = "total_score >= 50"
"#;
        let file = parse_rule_file_str(toml, &PathBuf::from("rules.toml")).unwrap();
        assert!(file.name.is_none());
        assert_eq!(file.rules[0].scale, 1.0);
    }

    #[test]
    fn validate_duplicates() {
        let toml = r#"
[[rules]]
grade = "A"
scale = 9
abs_rule = "total_score >= 80"

[[rules]]
grade = "A"
scale = 9
abs_rule = "total_score >= 70"
"#;
        let file = parse_rule_file_str(toml, &PathBuf::from("rules.toml")).unwrap();
        let warnings = validate_rule_set(&file.rules);
        assert!(warnings.iter().any(|w| w.message.contains("duplicate grade")));
        assert!(warnings.iter().any(|w| w.message.contains("scale 9")));
    }

    #[test]
    fn validate_predicate_presence() {
        let toml = r#"
[[rules]]
grade = "B"
scale = 8

[[rules]]
grade = "DT"
type = "non_calculated"
abs_rule = "total_score < 10"
"#;
        let file = parse_rule_file_str(toml, &PathBuf::from("rules.toml")).unwrap();
        let warnings = validate_rule_set(&file.rules);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].grade, "B");
        assert!(warnings[0].message.contains("never match"));
        assert_eq!(warnings[1].grade, "DT");
        assert!(warnings[1].message.contains("ignored"));
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_rule_file_str("[[rules]\ngrade = ", &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn parse_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("default.toml");
        std::fs::write(&path, VALID_TOML).unwrap();

        let file = parse_rule_file(&path).unwrap();
        assert_eq!(file.rules.len(), 4);

        let missing = parse_rule_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(format!("{missing:#}").contains("failed to read rule file"));
    }
}
