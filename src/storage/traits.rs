//! Storage traits and error types
//!
//! This module defines the persistence contract the crawler depends on:
//! records are loaded and saved by `(kind, name)`, and the store is the sole
//! source of truth for which URLs a query has already collected.

use crate::model::{Entity, EntityKind, Query, Source};
use crate::storage::{RunRecord, RunStatus};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: EntityKind, name: String },

    #[error("{kind} '{name}' is immutable once stored")]
    Immutable { kind: EntityKind, name: String },

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Sources and Queries are upserted. Responses and Articles are append-only:
/// saving one whose name already exists fails with
/// [`StorageError::Immutable`], and a second record with the same URL under
/// the same query fails with [`StorageError::ConstraintViolation`].
pub trait Storage {
    // ===== Entity Records =====

    /// Loads a record by kind and name
    ///
    /// # Returns
    ///
    /// * `Ok(Entity)` - The stored record
    /// * `Err(StorageError::NotFound)` - No record with that name
    fn load(&self, kind: EntityKind, name: &str) -> StorageResult<Entity>;

    /// Saves a record
    fn save(&mut self, entity: &Entity) -> StorageResult<()>;

    /// Returns true if a record with this kind and name exists
    fn exists(&self, kind: EntityKind, name: &str) -> StorageResult<bool>;

    /// Lists every record of a kind, ordered by name
    fn list(&self, kind: EntityKind) -> StorageResult<Vec<Entity>>;

    /// Lists records of a kind that belong to a query, ordered by name
    fn list_for_query(&self, query: &str, kind: EntityKind) -> StorageResult<Vec<Entity>>;

    /// Names of every record of a kind that belongs to a query
    fn names_for(&self, query: &str, kind: EntityKind) -> StorageResult<Vec<String>>;

    /// Every URL already collected for a query (Response and Article URLs)
    ///
    /// This seeds the dedup set before a crawl pass.
    fn collected_urls(&self, query: &str) -> StorageResult<Vec<String>>;

    /// Counts records of a kind
    fn count(&self, kind: EntityKind) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with the given status
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets the most recent run, if any
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Typed Helpers =====

    /// Loads a Source by name
    fn load_source(&self, name: &str) -> StorageResult<Source> {
        match self.load(EntityKind::Source, name)? {
            Entity::Source(source) => Ok(source),
            other => Err(StorageError::Serialization(format!(
                "expected source '{}', found {}",
                name,
                other.kind()
            ))),
        }
    }

    /// Loads a Query by name
    fn load_query(&self, name: &str) -> StorageResult<Query> {
        match self.load(EntityKind::Query, name)? {
            Entity::Query(query) => Ok(query),
            other => Err(StorageError::Serialization(format!(
                "expected query '{}', found {}",
                name,
                other.kind()
            ))),
        }
    }
}
