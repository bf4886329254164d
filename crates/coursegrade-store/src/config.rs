//! Configuration loading and adapter factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use coursegrade_core::traits::{GradeRuleSource, RecordStore};
use coursegrade_core::CourseService;

use crate::file::{FileStore, TomlRuleSource};
use crate::http::HttpStore;
use crate::memory::MemoryStore;

/// Where course documents are kept.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_store_root")]
        root: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

/// Where an institute's grading rules come from.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RulesConfig {
    File {
        #[serde(default = "default_rules_dir")]
        dir: PathBuf,
    },
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
}

fn masked(key: &Option<String>) -> Option<&'static str> {
    key.as_ref().map(|_| "***")
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::File { root } => f.debug_struct("File").field("root", root).finish(),
            StoreConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
        }
    }
}

impl std::fmt::Debug for RulesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesConfig::File { dir } => f.debug_struct("File").field("dir", dir).finish(),
            RulesConfig::Http { base_url, api_key } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &masked(api_key))
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            root: default_store_root(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig::File {
            dir: default_rules_dir(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./data/courses")
}
fn default_rules_dir() -> PathBuf {
    PathBuf::from("./rules")
}
fn default_tenant() -> String {
    "default".to_string()
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("./coursegrade-reports")
}

/// Top-level coursegrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursegradeConfig {
    /// Institute whose grading rules apply.
    #[serde(default = "default_tenant")]
    pub tenant_id: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    /// Directory grade reports are saved to.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

impl Default for CoursegradeConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant(),
            store: StoreConfig::default(),
            rules: RulesConfig::default(),
            report_dir: default_report_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        // Substituted values are not scanned again.
        result.push_str(&std::env::var(&rest[start + 2..start + len]).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_path(p: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&p.to_string_lossy()))
}

fn resolve_key(key: &Option<String>) -> Option<String> {
    key.as_deref()
        .map(resolve_env_vars)
        .filter(|k| !k.is_empty())
}

impl CoursegradeConfig {
    /// Resolve `${VAR}` references in every string field.
    fn resolve_env(&mut self) {
        self.tenant_id = resolve_env_vars(&self.tenant_id);
        if self.tenant_id.trim().is_empty() {
            self.tenant_id = default_tenant();
        }
        self.report_dir = resolve_path(&self.report_dir);

        self.store = match &self.store {
            StoreConfig::Memory => StoreConfig::Memory,
            StoreConfig::File { root } => StoreConfig::File {
                root: resolve_path(root),
            },
            StoreConfig::Http { base_url, api_key } => StoreConfig::Http {
                base_url: resolve_env_vars(base_url),
                api_key: resolve_key(api_key),
            },
        };
        self.rules = match &self.rules {
            RulesConfig::File { dir } => RulesConfig::File {
                dir: resolve_path(dir),
            },
            RulesConfig::Http { base_url, api_key } => RulesConfig::Http {
                base_url: resolve_env_vars(base_url),
                api_key: resolve_key(api_key),
            },
        };
    }

    /// Apply `COURSEGRADE_TENANT_ID` and `COURSEGRADE_STORE_KEY`.
    fn apply_env_overrides(&mut self) {
        if let Ok(tenant) = std::env::var("COURSEGRADE_TENANT_ID") {
            if !tenant.trim().is_empty() {
                self.tenant_id = tenant;
            }
        }
        if let Ok(key) = std::env::var("COURSEGRADE_STORE_KEY") {
            if let StoreConfig::Http { api_key, .. } = &mut self.store {
                *api_key = Some(key);
            }
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `coursegrade.toml` in the current directory
/// 2. `~/.config/coursegrade/config.toml`
///
/// Environment variable overrides: `COURSEGRADE_TENANT_ID`, `COURSEGRADE_STORE_KEY`.
pub fn load_config() -> Result<CoursegradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CoursegradeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("coursegrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => parse_config_file(path)?,
        None => CoursegradeConfig::default(),
    };

    config.resolve_env();
    config.apply_env_overrides();

    tracing::debug!(path = ?config_path, ?config, "configuration loaded");
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<CoursegradeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<CoursegradeConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("coursegrade"))
}

/// Create a record store from its configuration.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::File { root } => Ok(Arc::new(FileStore::new(root))),
        StoreConfig::Http { base_url, api_key } => {
            let store = HttpStore::new(base_url, api_key.clone())
                .with_context(|| format!("failed to create HTTP store for {base_url}"))?;
            Ok(Arc::new(store))
        }
    }
}

/// Create a grading rule source from its configuration.
pub fn create_rule_source(config: &RulesConfig) -> Result<Arc<dyn GradeRuleSource>> {
    match config {
        RulesConfig::File { dir } => Ok(Arc::new(TomlRuleSource::new(dir))),
        RulesConfig::Http { base_url, api_key } => {
            let source = HttpStore::new(base_url, api_key.clone())
                .with_context(|| format!("failed to create HTTP rule source for {base_url}"))?;
            Ok(Arc::new(source))
        }
    }
}

/// Build a course service wired to the configured adapters.
pub fn create_service(config: &CoursegradeConfig) -> Result<CourseService> {
    let store = create_store(&config.store)?;
    let rules = create_rule_source(&config.rules)?;
    Ok(CourseService::new(store, rules, config.tenant_id.clone()))
}
