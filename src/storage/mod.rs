// Storage module: durable activity ledger behind a backend trait.

mod sqlite;

use crate::config::StorageConfig;
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use sqlite::SqliteStorage;

/// One row per member. A member is tracked once per guild observed; rows are
/// never deleted automatically, even after the member leaves the guild.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub member_id: String,
    pub guild_id: String,
    pub last_seen: Option<f64>,
    pub dormant: bool,
}

/// Ledger persistence. Implementations are synchronous; async callers wrap
/// calls in `tokio::task::spawn_blocking`.
pub trait StorageBackend: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;

    fn get_meta(&self, key: &str) -> Result<Option<String>>;
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    /// Insert or refresh a member's last-seen timestamp. The dormant flag is
    /// preserved across the update.
    fn upsert_last_seen(&self, member_id: &str, guild_id: &str, last_seen: f64) -> Result<()>;
    fn get_member(&self, member_id: &str) -> Result<Option<MemberRecord>>;
    fn set_dormant(&self, member_id: &str, dormant: bool) -> Result<()>;

    fn list_by_guild(&self, guild_id: &str) -> Result<Vec<MemberRecord>>;
    fn list_all(&self) -> Result<Vec<MemberRecord>>;
    fn count_members(&self) -> Result<i64>;
    fn count_dormant(&self, guild_id: &str) -> Result<i64>;
}

pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend = config.backend.trim().to_lowercase();
    let backend = if backend.is_empty() {
        "sqlite".to_string()
    } else {
        backend
    };
    match backend.as_str() {
        "sqlite" | "default" => Ok(Arc::new(SqliteStorage::new(
            config.db_path.trim().to_string(),
        ))),
        other => Err(anyhow!("unknown storage backend: {other}")),
    }
}
