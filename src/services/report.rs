// Reporting layer: read-only aggregates over the ledger. No platform
// mutations happen here.
use crate::platform::PlatformAdapter;
use crate::services::reconciler::{elapsed_days, now_ts};
use crate::storage::{MemberRecord, StorageBackend};
use anyhow::{anyhow, Result};
use chrono::DateTime;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct MemberActivityView {
    pub member_id: String,
    pub guild_id: String,
    pub last_seen: Option<f64>,
    pub dormant: bool,
    pub elapsed_days: Option<i64>,
}

pub async fn dormant_count(storage: Arc<dyn StorageBackend>, guild_id: &str) -> Result<i64> {
    let guild_id = guild_id.to_string();
    tokio::task::spawn_blocking(move || storage.count_dormant(&guild_id))
        .await
        .map_err(|err| anyhow!(err.to_string()))?
}

/// Members of a guild whose inactivity is at least `min_days`, joined
/// against the live roster so stale rows for departed members drop out.
pub async fn list_inactive(
    storage: Arc<dyn StorageBackend>,
    platform: Arc<dyn PlatformAdapter>,
    guild_id: &str,
    min_days: i64,
) -> Result<Vec<MemberActivityView>> {
    let roster = platform
        .list_members(guild_id)
        .await
        .map_err(|err| anyhow!("roster fetch failed: {err}"))?;
    let roster_ids: HashSet<String> = roster.into_iter().map(|member| member.id).collect();

    let records = {
        let storage = storage.clone();
        let guild_id = guild_id.to_string();
        tokio::task::spawn_blocking(move || storage.list_by_guild(&guild_id))
            .await
            .map_err(|err| anyhow!(err.to_string()))??
    };

    Ok(filter_inactive(records, &roster_ids, now_ts(), min_days))
}

fn filter_inactive(
    records: Vec<MemberRecord>,
    roster_ids: &HashSet<String>,
    now: f64,
    min_days: i64,
) -> Vec<MemberActivityView> {
    let mut views: Vec<MemberActivityView> = records
        .into_iter()
        .filter(|record| roster_ids.contains(&record.member_id))
        .filter_map(|record| {
            let last_seen = record.last_seen?;
            let elapsed = elapsed_days(now, last_seen);
            if elapsed < min_days {
                return None;
            }
            Some(MemberActivityView {
                member_id: record.member_id,
                guild_id: record.guild_id,
                last_seen: Some(last_seen),
                dormant: record.dormant,
                elapsed_days: Some(elapsed),
            })
        })
        .collect();
    views.sort_by(|a, b| b.elapsed_days.cmp(&a.elapsed_days));
    views
}

/// Full ledger dump as CSV, stale rows included. Timestamps are rendered
/// ISO-8601 UTC.
pub async fn export_csv(storage: Arc<dyn StorageBackend>) -> Result<String> {
    let records = tokio::task::spawn_blocking(move || storage.list_all())
        .await
        .map_err(|err| anyhow!(err.to_string()))??;
    Ok(render_csv(&records))
}

pub fn render_csv(records: &[MemberRecord]) -> String {
    let mut output = String::from("guild_id,member_id,last_seen,dormant\n");
    for record in records {
        let last_seen = record
            .last_seen
            .and_then(format_timestamp)
            .unwrap_or_default();
        output.push_str(&format!(
            "{},{},{},{}\n",
            csv_field(&record.guild_id),
            csv_field(&record.member_id),
            last_seen,
            record.dormant as i64,
        ));
    }
    output
}

fn format_timestamp(ts: f64) -> Option<String> {
    let secs = ts.trunc() as i64;
    let nanos = ((ts.fract() * 1_000.0).round() as u32).min(999) * 1_000_000;
    DateTime::from_timestamp(secs, nanos).map(|dt| dt.to_rfc3339())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
