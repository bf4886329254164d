//! coursegrade-store — record store and rule source adapters.
//!
//! Implements the `RecordStore` and `GradeRuleSource` traits for an
//! in-memory map, a directory of JSON files, and a JSON-over-HTTP backend,
//! and builds them from `coursegrade.toml`.

pub mod config;
pub mod file;
pub mod http;
pub mod memory;

pub use config::{
    create_rule_source, create_service, create_store, load_config, load_config_from,
    CoursegradeConfig, RulesConfig, StoreConfig,
};
pub use file::{FileStore, TomlRuleSource};
pub use http::HttpStore;
pub use memory::{MemoryStore, StaticRuleSource};

use coursegrade_core::error::StoreError;

/// Reject keys that cannot be used as a file name or URL path segment.
pub(crate) fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control());
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// A fresh opaque concurrency token.
pub(crate) fn new_etag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
