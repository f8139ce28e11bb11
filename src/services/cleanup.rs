// Debounced deletion of ephemeral report messages. One pending timer per
// channel; a newer report always supersedes and cancels the older timer.
use crate::config_store::ConfigStore;
use crate::platform::PlatformAdapter;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct PendingDelete {
    seq: u64,
    message_id: String,
    token: CancellationToken,
}

pub struct CleanupScheduler {
    config_store: ConfigStore,
    platform: Arc<dyn PlatformAdapter>,
    timers: Mutex<HashMap<String, PendingDelete>>,
    next_seq: AtomicU64,
}

impl CleanupScheduler {
    pub fn new(config_store: ConfigStore, platform: Arc<dyn PlatformAdapter>) -> Arc<Self> {
        Arc::new(Self {
            config_store,
            platform,
            timers: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        })
    }

    /// Arm a delayed delete for `message_id` in `channel_id`. An existing
    /// timer for the channel is cancelled first, so only the newest
    /// scheduled deletion ever fires.
    pub async fn schedule(self: &Arc<Self>, channel_id: &str, message_id: &str) {
        let config = self.config_store.get().await;
        if !config.cleanup.auto_delete_enabled {
            return;
        }
        let delay = Duration::from_secs(config.cleanup.delay_s.max(1));
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        {
            let mut timers = self.timers.lock();
            if let Some(previous) = timers.insert(
                channel_id.to_string(),
                PendingDelete {
                    seq,
                    message_id: message_id.to_string(),
                    token: token.clone(),
                },
            ) {
                previous.token.cancel();
            }
        }

        let scheduler = Arc::clone(self);
        let channel = channel_id.to_string();
        let message = message_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(delay) => {
                    scheduler.fire(&channel, &message, seq).await;
                }
            }
        });
    }

    /// Explicitly drop a channel's pending deletion, if any.
    pub fn cancel(&self, channel_id: &str) -> bool {
        let mut timers = self.timers.lock();
        match timers.remove(channel_id) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.timers.lock().len()
    }

    async fn fire(&self, channel_id: &str, message_id: &str, seq: u64) {
        {
            // Delete only if this timer still owns the channel slot; a
            // superseding schedule may have raced past the sleep.
            let mut timers = self.timers.lock();
            match timers.get(channel_id) {
                Some(pending) if pending.seq == seq => {
                    timers.remove(channel_id);
                }
                _ => return,
            }
        }
        match self.platform.delete_message(channel_id, message_id).await {
            Ok(()) => {
                debug!(channel_id, message_id, "stale report message deleted");
            }
            Err(err) if err.is_not_found() => {
                // Already gone; that is the outcome we wanted.
                debug!(channel_id, message_id, "report message already deleted");
            }
            Err(err) => {
                warn!(channel_id, message_id, "report cleanup failed: {err}");
            }
        }
    }
}
