//! Subcommand implementations.

pub mod assignments;
pub mod attendance;
pub mod classify;
pub mod init;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::Serialize;

use coursegrade_core::CourseService;
use coursegrade_store::config::{create_service, load_config_from, CoursegradeConfig};

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Load configuration and build the course service it describes.
pub fn load_service(config_path: Option<&Path>) -> Result<(CoursegradeConfig, CourseService)> {
    let config = load_config_from(config_path)?;
    tracing::debug!(?config, "loaded configuration");
    let service = create_service(&config)?;
    Ok((config, service))
}

/// Read a JSON array of batch entries.
pub fn read_batch<T: DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch file: {}", path.display()))?;
    let batch: Vec<T> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse batch file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), entries = batch.len(), "read batch file");
    Ok(batch)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}
