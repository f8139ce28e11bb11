use async_trait::async_trait;
use parking_lot::Mutex;
use somnus_server::config::Config;
use somnus_server::config_store::ConfigStore;
use somnus_server::platform::{Guild, PlatformAdapter, PlatformError, RosterMember};
use somnus_server::services::cleanup::CleanupScheduler;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct DeleteRecorder {
    deleted: Mutex<Vec<(String, String)>>,
    missing: HashSet<(String, String)>,
}

impl DeleteRecorder {
    fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl PlatformAdapter for DeleteRecorder {
    async fn list_guilds(&self) -> Result<Vec<Guild>, PlatformError> {
        Ok(Vec::new())
    }
    async fn list_members(&self, _: &str) -> Result<Vec<RosterMember>, PlatformError> {
        Ok(Vec::new())
    }
    async fn grant_role(&self, _: &str, _: &str, _: &str) -> Result<(), PlatformError> {
        Ok(())
    }
    async fn revoke_role(&self, _: &str, _: &str, _: &str) -> Result<(), PlatformError> {
        Ok(())
    }
    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PlatformError> {
        let key = (channel_id.to_string(), message_id.to_string());
        if self.missing.contains(&key) {
            return Err(PlatformError::NotFound("message gone".to_string()));
        }
        self.deleted.lock().push(key);
        Ok(())
    }
}

fn store_with(delay_s: u64, auto_delete_enabled: bool) -> ConfigStore {
    let mut config = Config::default();
    config.cleanup.delay_s = delay_s;
    config.cleanup.auto_delete_enabled = auto_delete_enabled;
    let override_path = std::env::temp_dir().join(format!(
        "somnus_cleanup_{}.yaml",
        uuid::Uuid::new_v4().simple()
    ));
    ConfigStore::with_config(config, override_path)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn debounce_keeps_only_newest_deletion() {
    let platform = Arc::new(DeleteRecorder::default());
    let scheduler = CleanupScheduler::new(store_with(1, true), platform.clone());

    scheduler.schedule("ch1", "m1").await;
    scheduler.schedule("ch1", "m2").await;
    assert_eq!(scheduler.pending_count(), 1);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(
        platform.deleted(),
        vec![("ch1".to_string(), "m2".to_string())],
        "the superseded deletion must never fire"
    );
    assert_eq!(scheduler.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn channels_debounce_independently() {
    let platform = Arc::new(DeleteRecorder::default());
    let scheduler = CleanupScheduler::new(store_with(1, true), platform.clone());

    scheduler.schedule("ch1", "m1").await;
    scheduler.schedule("ch2", "m2").await;
    assert_eq!(scheduler.pending_count(), 2);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let mut deleted = platform.deleted();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            ("ch1".to_string(), "m1".to_string()),
            ("ch2".to_string(), "m2".to_string()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn explicit_cancel_prevents_deletion() {
    let platform = Arc::new(DeleteRecorder::default());
    let scheduler = CleanupScheduler::new(store_with(1, true), platform.clone());

    scheduler.schedule("ch1", "m1").await;
    assert!(scheduler.cancel("ch1"));
    assert!(!scheduler.cancel("ch1"));
    assert_eq!(scheduler.pending_count(), 0);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(platform.deleted().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disabled_auto_delete_schedules_nothing() {
    let platform = Arc::new(DeleteRecorder::default());
    let scheduler = CleanupScheduler::new(store_with(1, false), platform.clone());

    scheduler.schedule("ch1", "m1").await;
    assert_eq!(scheduler.pending_count(), 0);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(platform.deleted().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn already_deleted_message_is_not_an_error() {
    let mut recorder = DeleteRecorder::default();
    recorder
        .missing
        .insert(("ch1".to_string(), "m1".to_string()));
    let platform = Arc::new(recorder);
    let scheduler = CleanupScheduler::new(store_with(1, true), platform.clone());

    scheduler.schedule("ch1", "m1").await;
    tokio::time::sleep(Duration::from_millis(2_000)).await;

    // The slot is released and nothing was recorded as deleted.
    assert_eq!(scheduler.pending_count(), 0);
    assert!(platform.deleted().is_empty());
}
