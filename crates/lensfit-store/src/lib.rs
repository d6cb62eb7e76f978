//! lensfit-store — SQLite-backed measurement store.
//!
//! Keeps each packaged record as a JSON body alongside indexed columns, and
//! snapshot blobs keyed by their content address.

use chrono::{DateTime, Utc};
use lensfit_session::{Ack, FinalRecord, MeasurementStore, SnapshotRef, StoreError};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS measurements (
    id           TEXT PRIMARY KEY,
    captured_at  TEXT NOT NULL,
    stored_at    TEXT NOT NULL,
    snapshot_ref TEXT NOT NULL,
    body         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS measurements_captured_at ON measurements (captured_at);
CREATE TABLE IF NOT EXISTS snapshots (
    reference TEXT PRIMARY KEY,
    data      BLOB NOT NULL
);
";

#[derive(Error, Debug)]
pub enum SqliteStoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create store directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("corrupt record {id}: {source}")]
    Corrupt {
        id: String,
        source: serde_json::Error,
    },
    #[error("corrupt timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl From<SqliteStoreError> for StoreError {
    fn from(e: SqliteStoreError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// A record read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMeasurement {
    pub record: FinalRecord,
    pub stored_at: DateTime<Utc>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, SqliteStoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| SqliteStoreError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "opened measurement store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SqliteStoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Store snapshot bytes. Content-addressed, so storing twice is a no-op.
    pub fn put_snapshot(
        &self,
        reference: &SnapshotRef,
        data: &[u8],
    ) -> Result<(), SqliteStoreError> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO snapshots (reference, data) VALUES (?1, ?2)",
            params![reference.as_str(), data],
        )?;
        tracing::debug!(%reference, bytes = data.len(), inserted, "snapshot stored");
        Ok(())
    }

    pub fn snapshot(&self, reference: &SnapshotRef) -> Result<Option<Vec<u8>>, SqliteStoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT data FROM snapshots WHERE reference = ?1",
                params![reference.as_str()],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// All records, oldest capture first.
    pub fn list(&self) -> Result<Vec<StoredMeasurement>, SqliteStoreError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, stored_at, body FROM measurements ORDER BY captured_at, id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, stored_at, body) = row?;
            out.push(decode(id, &stored_at, &body)?);
        }
        Ok(out)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<StoredMeasurement>, SqliteStoreError> {
        let row = self
            .conn()
            .query_row(
                "SELECT stored_at, body FROM measurements WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(stored_at, body)| decode(id.to_string(), &stored_at, &body))
            .transpose()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode(id: String, stored_at: &str, body: &str) -> Result<StoredMeasurement, SqliteStoreError> {
    let record = serde_json::from_str(body).map_err(|source| SqliteStoreError::Corrupt {
        id,
        source,
    })?;
    let stored_at = DateTime::parse_from_rfc3339(stored_at)?.with_timezone(&Utc);
    Ok(StoredMeasurement { record, stored_at })
}

impl MeasurementStore for SqliteStore {
    fn persist(&self, record: &FinalRecord) -> Result<Ack, StoreError> {
        let body = serde_json::to_string(record)?;
        let stored_at = Utc::now();

        let result = self.conn().execute(
            "INSERT INTO measurements (id, captured_at, stored_at, snapshot_ref, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                record.captured_at.to_rfc3339(),
                stored_at.to_rfc3339(),
                record.snapshot_ref.as_str(),
                body,
            ],
        );

        match result {
            Ok(_) => Ok(Ack {
                record_id: record.id,
                stored_at,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(record.id))
            }
            Err(e) => Err(SqliteStoreError::from(e).into()),
        }
    }
}
