//! The `coursegrade assignments` commands.

use std::path::PathBuf;

use anyhow::Result;

use coursegrade_core::model::AssignmentUpdate;

use super::{load_service, read_batch};

pub async fn merge(course_id: String, input: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let batch: Vec<AssignmentUpdate> = read_batch(&input)?;
    let (_config, service) = load_service(config_path.as_deref())?;
    let course = service.merge_assignments(&course_id, &batch).await?;

    println!(
        "Merged {} assignment score(s) into {}.",
        batch.len(),
        course.id
    );
    Ok(())
}
