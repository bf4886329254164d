//! Directory-backed record store and TOML rule source.
//!
//! Each course lives in `<root>/<course_id>.json`. Writes go to a temporary
//! file that is renamed over the old one, so readers never see a torn
//! document. The etag check and the rename happen under one lock, which
//! serializes writers within this process only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::instrument;

use coursegrade_core::error::StoreError;
use coursegrade_core::model::{CourseDocument, RawGradingRule};
use coursegrade_core::parser::parse_rule_file_str;
use coursegrade_core::traits::{GradeRuleSource, RecordStore};

use crate::{check_key, new_etag};

/// A record store keeping one JSON file per course.
pub struct FileStore {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a course's document file.
    pub fn course_path(&self, course_id: &str) -> Result<PathBuf, StoreError> {
        check_key(course_id)?;
        Ok(self.root.join(format!("{course_id}.json")))
    }

    async fn load(&self, course_id: &str) -> Result<Option<CourseDocument>, StoreError> {
        let path = self.course_path(course_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl RecordStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn read_course(&self, course_id: &str) -> Result<CourseDocument, StoreError> {
        self.load(course_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(course_id.to_string()))
    }

    #[instrument(skip(self, course), fields(course_id = %course.id))]
    async fn write_course(&self, course: &CourseDocument) -> Result<CourseDocument, StoreError> {
        let path = self.course_path(&course.id)?;
        let _guard = self.write_lock.lock().await;

        // A missing document or one without a token only accepts a write
        // that carries no token either.
        let current = self.load(&course.id).await?.and_then(|c| c.etag);
        if current != course.etag {
            return Err(StoreError::Conflict {
                key: course.id.clone(),
            });
        }

        let mut stored = course.clone();
        stored.etag = Some(new_etag());
        let json = serde_json::to_string_pretty(&stored)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = self.root.join(format!(".{}.{}.tmp", course.id, new_etag()));
        tokio::fs::write(&tmp, json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), "course document written");
        Ok(stored)
    }
}

/// Grading rules read from `<dir>/<tenant_id>.toml`.
pub struct TomlRuleSource {
    dir: PathBuf,
}

impl TomlRuleSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn rule_file_path(&self, tenant_id: &str) -> Result<PathBuf, StoreError> {
        check_key(tenant_id)?;
        Ok(self.dir.join(format!("{tenant_id}.toml")))
    }
}

#[async_trait]
impl GradeRuleSource for TomlRuleSource {
    async fn grade_rules(&self, tenant_id: &str) -> Result<Vec<RawGradingRule>, StoreError> {
        let path = self.rule_file_path(tenant_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let file = parse_rule_file_str(&content, &path)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, format!("{e:#}")))?;
        tracing::debug!(tenant_id, rules = file.rules.len(), "loaded grading rules");
        Ok(file.rules)
    }
}
