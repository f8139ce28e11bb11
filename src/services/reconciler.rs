// Reconciliation engine: sweeps guild rosters, refreshes the ledger and
// grants the dormant role once inactivity crosses the configured threshold.
use crate::config_store::ConfigStore;
use crate::platform::{PlatformAdapter, Presence};
use crate::storage::{MemberRecord, StorageBackend};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SECONDS_PER_DAY: f64 = 86_400.0;
const SCHEDULER_IDLE_POLL_S: u64 = 60;

pub fn now_ts() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Whole days between two timestamps, floored. Partial days never round up,
/// so a member becomes eligible exactly at the threshold and not before.
pub fn elapsed_days(now: f64, last_seen: f64) -> i64 {
    ((now - last_seen) / SECONDS_PER_DAY).floor() as i64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub examined: i64,
    pub updated: i64,
    pub granted: i64,
    pub errors: i64,
    pub skipped_guilds: i64,
}

pub struct Reconciler {
    config_store: ConfigStore,
    storage: Arc<dyn StorageBackend>,
    platform: Arc<dyn PlatformAdapter>,
    pass_guard: Mutex<()>,
}

impl Reconciler {
    pub fn new(
        config_store: ConfigStore,
        storage: Arc<dyn StorageBackend>,
        platform: Arc<dyn PlatformAdapter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config_store,
            storage,
            platform,
            pass_guard: Mutex::new(()),
        })
    }

    /// One full sweep over every guild the account belongs to. At most one
    /// pass runs at a time; a concurrent trigger gets an explicit error.
    /// No per-member failure aborts the pass.
    pub async fn run_pass(&self, only_long_dormant: bool) -> Result<PassSummary> {
        let Ok(_guard) = self.pass_guard.try_lock() else {
            return Err(anyhow!("reconciliation pass already in progress"));
        };

        let config = self.config_store.get().await;
        let inactive_days = config.reconcile.inactive_days.max(1);
        let yield_every = config.reconcile.yield_every.max(1);
        let dormant_role = config.platform.dormant_role.clone();
        let pass_id = format!("pass_{}", Uuid::new_v4().simple());

        // The ledger must be readable before any work starts; a dead store
        // is a pass-level failure, not a string of per-member errors.
        self.count_members()
            .await
            .map_err(|err| anyhow!("ledger unavailable at pass start: {err}"))?;

        let guilds = self
            .platform
            .list_guilds()
            .await
            .map_err(|err| anyhow!("guild enumeration failed: {err}"))?;

        let now = now_ts();
        let mut summary = PassSummary::default();
        let mut processed = 0usize;

        info!(
            %pass_id,
            only_long_dormant,
            inactive_days,
            guilds = guilds.len(),
            "reconciliation pass started"
        );

        for guild in &guilds {
            let members = match self.platform.list_members(&guild.id).await {
                Ok(members) => members,
                Err(err) => {
                    warn!(%pass_id, guild_id = %guild.id, "roster fetch failed, skipping guild: {err}");
                    summary.skipped_guilds += 1;
                    continue;
                }
            };

            for member in members {
                if member.bot {
                    continue;
                }
                summary.examined += 1;
                processed += 1;
                if processed % yield_every == 0 {
                    // Long rosters must not starve timers and health checks.
                    tokio::task::yield_now().await;
                }

                let record = match self.get_member(&member.id).await {
                    Ok(record) => record,
                    Err(err) => {
                        warn!(%pass_id, member_id = %member.id, "ledger read failed: {err}");
                        summary.errors += 1;
                        continue;
                    }
                };

                // Only confirmed-offline sightings touch the ledger; the
                // stored value means "last seen offline at this instant".
                if member.presence == Presence::Offline {
                    match self.upsert_last_seen(&member.id, &guild.id, now).await {
                        Ok(()) => summary.updated += 1,
                        Err(err) => {
                            warn!(%pass_id, member_id = %member.id, "ledger write failed: {err}");
                            summary.errors += 1;
                        }
                    }
                }

                // The grant decision uses the record as it stood before this
                // pass refreshed it.
                let Some(last_seen) = record.as_ref().and_then(|r| r.last_seen) else {
                    continue;
                };
                let already_dormant = record.as_ref().map(|r| r.dormant).unwrap_or(false);
                let elapsed = elapsed_days(now, last_seen);
                if elapsed < inactive_days || already_dormant {
                    continue;
                }

                match self
                    .platform
                    .grant_role(&guild.id, &member.id, &dormant_role)
                    .await
                {
                    Ok(()) => match self.set_dormant(&member.id, true).await {
                        Ok(()) => {
                            summary.granted += 1;
                            debug!(%pass_id, member_id = %member.id, elapsed, "dormant role granted");
                        }
                        Err(err) => {
                            warn!(%pass_id, member_id = %member.id, "flag update failed after grant: {err}");
                            summary.errors += 1;
                        }
                    },
                    Err(err) if err.is_not_found() => {
                        // Member left between roster fetch and grant.
                        debug!(%pass_id, member_id = %member.id, "member gone, skipping grant");
                    }
                    Err(err) => {
                        warn!(%pass_id, member_id = %member.id, "role grant failed: {err}");
                        summary.errors += 1;
                    }
                }
            }
        }

        info!(
            %pass_id,
            examined = summary.examined,
            updated = summary.updated,
            granted = summary.granted,
            errors = summary.errors,
            skipped_guilds = summary.skipped_guilds,
            "reconciliation pass finished"
        );
        if let Err(err) = self.record_last_pass(now, &summary).await {
            warn!(%pass_id, "failed to record pass marker: {err}");
        }
        Ok(summary)
    }

    async fn record_last_pass(&self, finished_at: f64, summary: &PassSummary) -> Result<()> {
        let storage = self.storage.clone();
        let payload = serde_json::to_string(summary)?;
        tokio::task::spawn_blocking(move || {
            storage.set_meta("last_pass_at", &finished_at.to_string())?;
            storage.set_meta("last_pass_summary", &payload)
        })
        .await
        .map_err(|err| anyhow!(err.to_string()))?
    }

    /// Manual reversal: drop the role and clear the flag. The only backward
    /// edge out of the dormant state.
    pub async fn revoke(&self, member_id: &str) -> Result<MemberRecord> {
        let record = self
            .get_member(member_id)
            .await?
            .ok_or_else(|| anyhow!("member not tracked: {member_id}"))?;
        let config = self.config_store.get().await;
        match self
            .platform
            .revoke_role(
                &record.guild_id,
                member_id,
                &config.platform.dormant_role,
            )
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(member_id, "role or member already gone on revoke");
            }
            Err(err) => return Err(anyhow!("role revoke failed: {err}")),
        }
        self.set_dormant(member_id, false).await?;
        self.get_member(member_id)
            .await?
            .ok_or_else(|| anyhow!("member vanished during revoke: {member_id}"))
    }

    async fn get_member(&self, member_id: &str) -> Result<Option<MemberRecord>> {
        let storage = self.storage.clone();
        let member_id = member_id.to_string();
        tokio::task::spawn_blocking(move || storage.get_member(&member_id))
            .await
            .map_err(|err| anyhow!(err.to_string()))?
    }

    async fn upsert_last_seen(&self, member_id: &str, guild_id: &str, ts: f64) -> Result<()> {
        let storage = self.storage.clone();
        let member_id = member_id.to_string();
        let guild_id = guild_id.to_string();
        tokio::task::spawn_blocking(move || storage.upsert_last_seen(&member_id, &guild_id, ts))
            .await
            .map_err(|err| anyhow!(err.to_string()))?
    }

    async fn set_dormant(&self, member_id: &str, dormant: bool) -> Result<()> {
        let storage = self.storage.clone();
        let member_id = member_id.to_string();
        tokio::task::spawn_blocking(move || storage.set_dormant(&member_id, dormant))
            .await
            .map_err(|err| anyhow!(err.to_string()))?
    }

    async fn count_members(&self) -> Result<i64> {
        let storage = self.storage.clone();
        tokio::task::spawn_blocking(move || storage.count_members())
            .await
            .map_err(|err| anyhow!(err.to_string()))?
    }
}

/// Background trigger: runs a pass on startup and then on the configured
/// interval, mirroring the admin "run now" entry point.
pub struct ReconcileScheduler {
    config_store: ConfigStore,
    reconciler: Arc<Reconciler>,
}

impl ReconcileScheduler {
    pub fn new(config_store: ConfigStore, reconciler: Arc<Reconciler>) -> Arc<Self> {
        Arc::new(Self {
            config_store,
            reconciler,
        })
    }

    pub fn start(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            let config = self.config_store.get().await;
            if !config.reconcile.enabled {
                sleep(Duration::from_secs(SCHEDULER_IDLE_POLL_S)).await;
                continue;
            }
            match self.reconciler.run_pass(false).await {
                Ok(summary) => {
                    debug!(?summary, "scheduled reconciliation pass done");
                }
                Err(err) => {
                    // Includes the case of an admin-triggered pass still
                    // holding the single-flight guard.
                    warn!("scheduled reconciliation pass failed: {err}");
                }
            }
            let interval = config.reconcile.interval_s.max(SCHEDULER_IDLE_POLL_S);
            sleep(Duration::from_secs(interval)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_days_floors_partial_days() {
        let now = 1_000_000.0;
        assert_eq!(elapsed_days(now, now), 0);
        assert_eq!(elapsed_days(now, now - SECONDS_PER_DAY + 1.0), 0);
        assert_eq!(elapsed_days(now, now - SECONDS_PER_DAY), 1);
        assert_eq!(elapsed_days(now, now - 30.0 * SECONDS_PER_DAY), 30);
        assert_eq!(
            elapsed_days(now, now - 30.0 * SECONDS_PER_DAY + 3_600.0),
            29
        );
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let inactive_days = 30i64;
        let now = 2_000_000.0;
        let at_threshold = elapsed_days(now, now - 30.0 * SECONDS_PER_DAY - 1.0);
        let below_threshold = elapsed_days(now, now - 29.0 * SECONDS_PER_DAY);
        assert!(at_threshold >= inactive_days);
        assert!(below_threshold < inactive_days);
    }
}
