// Shared config handle: admin updates persist back to the override file.
use crate::config::{load_config, Config};
use anyhow::Result;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<RwLock<Config>>,
    override_path: PathBuf,
    version: Arc<AtomicU64>,
}

impl ConfigStore {
    pub fn new(override_path: PathBuf) -> Self {
        let config = load_config();
        Self {
            inner: Arc::new(RwLock::new(config)),
            override_path,
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_config(config: Config, override_path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            override_path,
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self) -> Config {
        self.inner.read().await.clone()
    }

    pub async fn update<F>(&self, updater: F) -> Result<Config>
    where
        F: FnOnce(&mut Config),
    {
        let mut guard = self.inner.write().await;
        updater(&mut guard);
        let updated = guard.clone();
        drop(guard);
        self.version.fetch_add(1, Ordering::SeqCst);
        self.persist(&updated).await?;
        Ok(updated)
    }

    async fn persist(&self, config: &Config) -> Result<()> {
        let value = serde_yaml::to_value(config).unwrap_or(Value::Null);
        let text = serde_yaml::to_string(&value).unwrap_or_default();
        let target = self.override_path.clone();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        if let Err(err) = tokio::fs::write(&target, text).await {
            warn!("failed to write config override: {}: {err}", target.display());
        }
        Ok(())
    }

    pub fn override_path_default() -> PathBuf {
        let path = std::env::var("SOMNUS_CONFIG_OVERRIDE_PATH")
            .unwrap_or_else(|_| "data/config/somnus.override.yaml".to_string());
        Path::new(&path).to_path_buf()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
