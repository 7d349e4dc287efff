//! Storage module for persisting the entity graph
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Source, Query, Response and Article persistence keyed by `(kind, name)`
//! - The per-query collected-URL set used to seed deduplication
//! - Run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::CorpusError;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(CorpusError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, CorpusError> {
    SqliteStorage::new(path)
}

/// One row of the run ledger
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// SHA-256 of the configuration file the run was started with
    pub config_hash: String,
    pub status: RunStatus,
}

impl RunRecord {
    /// Wall-clock length of a finished run
    pub fn duration(&self) -> Option<Duration> {
        self.finished_at.map(|finished| finished - self.started_at)
    }
}

/// Final (or current) state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "interrupted" => Ok(Self::Interrupted),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}
