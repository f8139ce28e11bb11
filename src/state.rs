// Shared application state: config, ledger, platform client and services.
use crate::config::Config;
use crate::config_store::ConfigStore;
use crate::platform::{GatewayAdapter, PlatformAdapter};
use crate::services::cleanup::CleanupScheduler;
use crate::services::reconciler::Reconciler;
use crate::storage::{build_storage, StorageBackend};
use anyhow::Result;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config_store: ConfigStore,
    pub storage: Arc<dyn StorageBackend>,
    pub platform: Arc<dyn PlatformAdapter>,
    pub reconciler: Arc<Reconciler>,
    pub cleanup: Arc<CleanupScheduler>,
}

impl AppState {
    pub fn new(config_store: ConfigStore, config: Config) -> Result<Self> {
        let storage = init_storage(&config)?;
        let platform: Arc<dyn PlatformAdapter> = Arc::new(GatewayAdapter::new(&config.platform));
        Ok(Self::with_parts(config_store, storage, platform))
    }

    /// Wiring seam for tests: any storage backend and platform client.
    pub fn with_parts(
        config_store: ConfigStore,
        storage: Arc<dyn StorageBackend>,
        platform: Arc<dyn PlatformAdapter>,
    ) -> Self {
        let reconciler = Reconciler::new(config_store.clone(), storage.clone(), platform.clone());
        let cleanup = CleanupScheduler::new(config_store.clone(), platform.clone());
        Self {
            config_store,
            storage,
            platform,
            reconciler,
            cleanup,
        }
    }
}

fn init_storage(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    let storage = build_storage(&config.storage)?;
    storage.ensure_initialized()?;
    Ok(storage)
}
