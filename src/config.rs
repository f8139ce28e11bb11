// Configuration loading: base YAML merged with the runtime override file.
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    pub api_key: Option<String>,
}

impl SecurityConfig {
    pub fn api_key(&self) -> Option<String> {
        let configured = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string());
        if configured.is_some() {
            return configured;
        }
        env::var("SOMNUS_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    pub timeout_s: u64,
    pub dormant_role: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9400".to_string(),
            token: None,
            timeout_s: 15,
            dormant_role: "dormant".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub enabled: bool,
    pub interval_s: u64,
    pub inactive_days: i64,
    pub yield_every: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: 86_400,
            inactive_days: 30,
            yield_every: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    pub auto_delete_enabled: bool,
    pub delay_s: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_delete_enabled: true,
            delay_s: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_path: "./data/somnus.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

pub fn load_config() -> Config {
    let base_path =
        env::var("SOMNUS_CONFIG_PATH").unwrap_or_else(|_| "config/somnus.yaml".to_string());
    let override_path = env::var("SOMNUS_CONFIG_OVERRIDE_PATH")
        .unwrap_or_else(|_| "data/config/somnus.override.yaml".to_string());

    let mut merged = read_yaml(&base_path);
    if Path::new(&override_path).exists() {
        // Only non-null override fields replace base values, so an admin
        // update never wipes unrelated sections.
        let override_value = read_yaml(&override_path);
        merge_yaml(&mut merged, override_value);
    }

    expand_yaml_env(&mut merged);

    serde_yaml::from_value::<Config>(merged).unwrap_or_else(|err| {
        warn!("failed to parse config, falling back to defaults: {err}");
        Config::default()
    })
}

fn read_yaml(path: &str) -> Value {
    // The config file is allowed to be absent on a fresh checkout.
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return Value::Null,
    };
    serde_yaml::from_str(&content).unwrap_or_else(|err| {
        warn!("failed to parse YAML: {path}, {err}");
        Value::Null
    })
}

fn merge_yaml(base: &mut Value, override_value: Value) {
    match (base, override_value) {
        (Value::Mapping(base_map), Value::Mapping(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base_slot, override_value) => {
            if !override_value.is_null() {
                *base_slot = override_value;
            }
        }
    }
}

fn expand_yaml_env(value: &mut Value) {
    match value {
        Value::String(text) => {
            *text = expand_env_placeholders(text);
        }
        Value::Sequence(items) => {
            for item in items {
                expand_yaml_env(item);
            }
        }
        Value::Mapping(map) => {
            for (_, value) in map.iter_mut() {
                expand_yaml_env(value);
            }
        }
        _ => {}
    }
}

fn expand_env_placeholders(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        rest = &rest[start + 2..];
        let Some(end) = rest.find('}') else {
            output.push_str("${");
            output.push_str(rest);
            return output;
        };
        let inner = &rest[..end];
        rest = &rest[end + 1..];
        let (name, default_value) = match inner.split_once(":-") {
            Some((name, default_value)) => (name.trim(), Some(default_value)),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            output.push_str("${");
            output.push_str(inner);
            output.push('}');
            continue;
        }
        let resolved = env::var(name).ok().filter(|value| !value.is_empty());
        match (resolved, default_value) {
            (Some(value), _) => output.push_str(&value),
            (None, Some(default_value)) => output.push_str(default_value),
            (None, None) => {}
        }
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_documented_values() {
        let config = Config::default();
        assert_eq!(config.reconcile.inactive_days, 30);
        assert!(config.cleanup.auto_delete_enabled);
        assert_eq!(config.cleanup.delay_s, 3);
        assert_eq!(config.storage.backend, "sqlite");
    }

    #[test]
    fn merge_prefers_override_values() {
        let mut base: Value =
            serde_yaml::from_str("reconcile:\n  inactive_days: 30\n  interval_s: 86400\n").unwrap();
        let override_value: Value =
            serde_yaml::from_str("reconcile:\n  inactive_days: 14\n").unwrap();
        merge_yaml(&mut base, override_value);
        let config: Config = serde_yaml::from_value(base).unwrap();
        assert_eq!(config.reconcile.inactive_days, 14);
        assert_eq!(config.reconcile.interval_s, 86_400);
    }

    #[test]
    fn null_override_keeps_base_value() {
        let mut base: Value = serde_yaml::from_str("cleanup:\n  delay_s: 3\n").unwrap();
        let override_value: Value = serde_yaml::from_str("cleanup:\n  delay_s: ~\n").unwrap();
        merge_yaml(&mut base, override_value);
        let config: Config = serde_yaml::from_value(base).unwrap();
        assert_eq!(config.cleanup.delay_s, 3);
    }

    #[test]
    fn expand_env_placeholders_resolves_defaults() {
        std::env::remove_var("SOMNUS_TEST_PLACEHOLDER");
        assert_eq!(
            expand_env_placeholders("${SOMNUS_TEST_PLACEHOLDER:-fallback}"),
            "fallback"
        );
        std::env::set_var("SOMNUS_TEST_PLACEHOLDER", "value");
        assert_eq!(
            expand_env_placeholders("pre-${SOMNUS_TEST_PLACEHOLDER}-post"),
            "pre-value-post"
        );
        std::env::remove_var("SOMNUS_TEST_PLACEHOLDER");
    }
}
