//! SQLite-backed [`SheetStore`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use uuid::Uuid;

use crate::config::NUM_ROWS;
use crate::record::{RecordId, SheetData, SheetPatch, SheetRecord, SheetSummary, normalize_title};
use crate::remote::{SheetStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sheets (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    data TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sheets_updated_at ON sheets(updated_at DESC);
";

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(Box::new(e))
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SheetSummary> {
    Ok(SheetSummary {
        id: RecordId(row.get(0)?),
        title: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Stored payloads that fail to parse load as the blank shape.
fn decode_data(raw: &str) -> SheetData {
    let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|e| {
        warn!("stored sheet payload is not valid JSON: {}", e);
        Value::Null
    });
    SheetData::from_value(&value, NUM_ROWS)
}

fn fetch(conn: &Connection, id: &RecordId) -> Result<SheetRecord, StoreError> {
    let row = conn
        .query_row(
            "SELECT id, title, data, created_at, updated_at FROM sheets WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let (id_str, title, data, created_at, updated_at) =
        row.ok_or_else(|| StoreError::NotFound(id.clone()))?;
    Ok(SheetRecord {
        id: RecordId(id_str),
        title,
        data: decode_data(&data),
        created_at,
        updated_at,
    })
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` in WAL mode.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        let journal_mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        if !journal_mode.eq_ignore_ascii_case("wal") {
            warn!("WAL mode not enabled for {:?}, using {}", path, journal_mode);
        }
        conn.execute_batch("PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;")?;
        info!("opened sheet database {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|e| e.into_inner());
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

impl SheetStore for SqliteStore {
    async fn list(&self, limit: usize) -> Result<Vec<SheetSummary>, StoreError> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM sheets
                 ORDER BY updated_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], summary_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SheetSummary>, StoreError> {
        let pattern = format!("%{}%", query.trim());
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM sheets
                 WHERE title LIKE ?1 COLLATE NOCASE
                 ORDER BY updated_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![pattern, limit as i64], summary_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn create(&self, title: &str, data: &SheetData) -> Result<SheetRecord, StoreError> {
        let id = RecordId(Uuid::new_v4().to_string());
        let title = normalize_title(title);
        let payload = serde_json::to_string(data)?;
        self.run(move |conn| {
            let ts = now();
            conn.execute(
                "INSERT INTO sheets (id, title, data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id.as_str(), title, payload, ts],
            )?;
            debug!("inserted sheet {}", id);
            fetch(conn, &id)
        })
        .await
    }

    async fn get(&self, id: &RecordId) -> Result<SheetRecord, StoreError> {
        let id = id.clone();
        self.run(move |conn| fetch(conn, &id)).await
    }

    async fn update(&self, id: &RecordId, patch: SheetPatch) -> Result<SheetRecord, StoreError> {
        let id = id.clone();
        let title = patch.title.as_deref().map(normalize_title);
        let payload = patch.data.as_ref().map(serde_json::to_string).transpose()?;
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE sheets SET
                    title = COALESCE(?2, title),
                    data = COALESCE(?3, data),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id.as_str(), title, payload, now()],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            fetch(conn, &id)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn sqlite_errors_box_into_database() {
        let err = StoreError::from(rusqlite::Error::InvalidQuery);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(err.to_string().starts_with("database error"));
        assert!(err.source().is_some());
    }
}
