//! The `coursegrade validate` command.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::parser::{parse_rule_file, validate_rule_set};
use coursegrade_core::GradingSystem;

pub fn execute(rules_path: PathBuf) -> Result<()> {
    let file = parse_rule_file(&rules_path)?;
    let name = file
        .name
        .clone()
        .unwrap_or_else(|| rules_path.display().to_string());
    println!("Rule set: {name} ({} rules)", file.rules.len());

    // expressions are fatal, the rest are warnings
    GradingSystem::from_definitions(&file.rules)?;

    let warnings = validate_rule_set(&file.rules);
    for w in &warnings {
        println!("  [{}] WARNING: {}", w.grade, w.message);
    }

    if warnings.is_empty() {
        println!("All rules valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
