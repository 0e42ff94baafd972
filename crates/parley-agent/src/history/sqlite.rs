//! SQLite-backed history store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::{AqRecord, HistoryStore};

pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open history db: {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        ensure_history_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(super) async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("history db lock poisoned"))?;
            f(&guard)
        })
        .await
        .context("history db task panicked")?
    }
}

// ─── Schema ─────────────────────────────────────────────────────────────────

fn ensure_history_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            question TEXT NOT NULL DEFAULT '',
            answer TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            token INTEGER NOT NULL DEFAULT 0,
            create_time INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_records_user ON records(user_id, is_deleted, id);
        "#,
    )?;
    Ok(())
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn get_recent(&self, user_id: &str, limit: usize) -> Result<Vec<AqRecord>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT question, answer, content, token, create_time FROM records
                 WHERE user_id = ?1 AND is_deleted = 0
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![user_id, limit as i64], |row| {
                Ok(AqRecord {
                    question: row.get(0)?,
                    answer: row.get(1)?,
                    tool_messages: row.get(2)?,
                    token: row.get::<_, i64>(3)?.max(0) as u64,
                    create_time: row.get(4)?,
                })
            })?;
            let mut records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            records.reverse();
            Ok(records)
        })
        .await
    }

    async fn insert(&self, user_id: &str, record: AqRecord) -> Result<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (user_id, question, answer, content, token, create_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    record.question,
                    record.answer,
                    record.tool_messages,
                    record.token as i64,
                    record.create_time,
                ],
            )?;
            Ok(())
        })
        .await
    }
}
