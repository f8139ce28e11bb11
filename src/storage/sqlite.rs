// SQLite ledger implementation.
use crate::storage::{MemberRecord, StorageBackend};
use anyhow::Result;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SqliteStorage {
    db_path: PathBuf,
    initialized: AtomicBool,
    init_guard: Mutex<()>,
}

impl SqliteStorage {
    pub fn new(db_path: String) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("./data/somnus.db")
        } else {
            PathBuf::from(db_path)
        };
        Self {
            db_path: path,
            initialized: AtomicBool::new(false),
            init_guard: Mutex::new(()),
        }
    }

    fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_db_dir()?;
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Ok(conn)
    }

    fn now_ts() -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }

    fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemberRecord> {
        Ok(MemberRecord {
            member_id: row.get(0)?,
            guild_id: row.get(1)?,
            last_seen: row.get(2)?,
            dormant: row.get::<_, i64>(3)? != 0,
        })
    }
}

impl StorageBackend for SqliteStorage {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.init_guard.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL,
              updated_time REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS members (
              member_id TEXT PRIMARY KEY,
              guild_id TEXT NOT NULL,
              last_seen REAL,
              dormant INTEGER NOT NULL DEFAULT 0,
              updated_time REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_members_guild
              ON members (guild_id);
            CREATE INDEX IF NOT EXISTS idx_members_guild_dormant
              ON members (guild_id, dormant);
            "#,
        )?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let now = Self::now_ts();
        conn.execute(
            "INSERT INTO meta (key, value, updated_time) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_time = excluded.updated_time",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn upsert_last_seen(&self, member_id: &str, guild_id: &str, last_seen: f64) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let now = Self::now_ts();
        // Single statement, atomic per member; the dormant flag is untouched.
        conn.execute(
            "INSERT INTO members (member_id, guild_id, last_seen, dormant, updated_time) \
             VALUES (?, ?, ?, 0, ?) \
             ON CONFLICT(member_id) DO UPDATE SET \
               guild_id = excluded.guild_id, \
               last_seen = excluded.last_seen, \
               updated_time = excluded.updated_time",
            params![member_id, guild_id, last_seen, now],
        )?;
        Ok(())
    }

    fn get_member(&self, member_id: &str) -> Result<Option<MemberRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let record = conn
            .query_row(
                "SELECT member_id, guild_id, last_seen, dormant FROM members WHERE member_id = ?",
                params![member_id],
                Self::row_to_member,
            )
            .optional()?;
        Ok(record)
    }

    fn set_dormant(&self, member_id: &str, dormant: bool) -> Result<()> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let now = Self::now_ts();
        conn.execute(
            "UPDATE members SET dormant = ?, updated_time = ? WHERE member_id = ?",
            params![dormant as i64, now, member_id],
        )?;
        Ok(())
    }

    fn list_by_guild(&self, guild_id: &str) -> Result<Vec<MemberRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT member_id, guild_id, last_seen, dormant FROM members WHERE guild_id = ?",
        )?;
        let rows = stmt.query_map(params![guild_id], Self::row_to_member)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn list_all(&self) -> Result<Vec<MemberRecord>> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let mut stmt =
            conn.prepare("SELECT member_id, guild_id, last_seen, dormant FROM members")?;
        let rows = stmt.query_map([], Self::row_to_member)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count_members(&self) -> Result<i64> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
        Ok(count)
    }

    fn count_dormant(&self, guild_id: &str) -> Result<i64> {
        self.ensure_initialized()?;
        let conn = self.open()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM members WHERE guild_id = ? AND dormant = 1",
            params![guild_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
