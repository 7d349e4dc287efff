//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Records are stored as tagged JSON payloads next to the columns needed for
//! lookups (`kind`, `name`, owning `query`, dedup `url`).

use crate::model::{dates, Entity, EntityKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use crate::CorpusError;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CorpusError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CorpusError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CorpusError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn decode(payload: &str) -> StorageResult<Entity> {
        Ok(serde_json::from_str(payload)?)
    }

    fn decode_all(payloads: Vec<String>) -> StorageResult<Vec<Entity>> {
        payloads.iter().map(|p| Self::decode(p)).collect()
    }

    fn query_strings(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_immutable(&mut self, entity: &Entity, payload: &str) -> StorageResult<()> {
        let kind = entity.kind();
        let name = entity.name();

        if self.exists(kind, name)? {
            return Err(StorageError::Immutable {
                kind,
                name: name.to_string(),
            });
        }

        let result = self.conn.execute(
            "INSERT INTO entities (kind, name, query, url, payload, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                kind.as_str(),
                name,
                entity.query(),
                entity.url(),
                payload,
                dates::format_datetime(&Utc::now())
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::ConstraintViolation(format!(
                    "{} url '{}' already stored for query '{}'",
                    kind,
                    entity.url().unwrap_or_default(),
                    entity.query().unwrap_or_default()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&mut self, entity: &Entity, payload: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO entities (kind, name, query, url, payload, saved_at)
             VALUES (?1, ?2, NULL, NULL, ?3, ?4)
             ON CONFLICT(kind, name) DO UPDATE SET
                payload = excluded.payload,
                saved_at = excluded.saved_at",
            params![
                entity.kind().as_str(),
                entity.name(),
                payload,
                dates::format_datetime(&Utc::now())
            ],
        )?;
        Ok(())
    }

    fn read_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
        let started_at: String = row.get(1)?;
        let finished_at: Option<String> = row.get(2)?;
        let status: String = row.get(4)?;

        Ok(RunRecord {
            id: row.get(0)?,
            started_at: dates::parse_datetime(&started_at).unwrap_or_default(),
            finished_at: finished_at.as_deref().and_then(dates::parse_datetime),
            config_hash: row.get(3)?,
            status: status.parse().unwrap_or(RunStatus::Running),
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Entity Records =====

    fn load(&self, kind: EntityKind, name: &str) -> StorageResult<Entity> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM entities WHERE kind = ?1 AND name = ?2",
                params![kind.as_str(), name],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(payload) => Self::decode(&payload),
            None => Err(StorageError::NotFound {
                kind,
                name: name.to_string(),
            }),
        }
    }

    fn save(&mut self, entity: &Entity) -> StorageResult<()> {
        let payload = serde_json::to_string(entity)?;
        if entity.kind().is_immutable() {
            self.insert_immutable(entity, &payload)
        } else {
            self.upsert(entity, &payload)
        }
    }

    fn exists(&self, kind: EntityKind, name: &str) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?1 AND name = ?2",
            params![kind.as_str(), name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list(&self, kind: EntityKind) -> StorageResult<Vec<Entity>> {
        let payloads = self.query_strings(
            "SELECT payload FROM entities WHERE kind = ?1 ORDER BY name",
            &[&kind.as_str()],
        )?;
        Self::decode_all(payloads)
    }

    fn list_for_query(&self, query: &str, kind: EntityKind) -> StorageResult<Vec<Entity>> {
        let payloads = self.query_strings(
            "SELECT payload FROM entities WHERE kind = ?1 AND query = ?2 ORDER BY name",
            &[&kind.as_str(), &query],
        )?;
        Self::decode_all(payloads)
    }

    fn names_for(&self, query: &str, kind: EntityKind) -> StorageResult<Vec<String>> {
        self.query_strings(
            "SELECT name FROM entities WHERE kind = ?1 AND query = ?2 ORDER BY name",
            &[&kind.as_str(), &query],
        )
    }

    fn collected_urls(&self, query: &str) -> StorageResult<Vec<String>> {
        self.query_strings(
            "SELECT DISTINCT url FROM entities
             WHERE query = ?1 AND url IS NOT NULL
             ORDER BY url",
            &[&query],
        )
    }

    fn count(&self, kind: EntityKind) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = dates::format_datetime(&Utc::now());
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = dates::format_datetime(&Utc::now());
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                Self::read_run,
            )
            .optional()?)
    }
}
