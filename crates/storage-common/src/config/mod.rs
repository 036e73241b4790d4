use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StorageError};
use crate::pagination::PaginationConfig;

/// Environment variable naming an optional YAML or JSON config file.
pub const CONFIG_FILE_ENV: &str = "STORAGE_COMMON_CONFIG";
pub const PAGINATION_OVERFLOW_ENV: &str = "STORAGE_PAGINATION_OVERFLOW";
pub const PAGINATION_MAX_LIMIT_ENV: &str = "STORAGE_PAGINATION_MAX_LIMIT";
pub const JSON_PRETTY_ENV: &str = "STORAGE_JSON_PRETTY";

/// Settings shared by every service built on this crate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    pub pagination: PaginationConfig,
    pub json: JsonConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Indent output written by the shared mapper.
    pub pretty: bool,
}

static CONFIG: OnceLock<CommonConfig> = OnceLock::new();

impl CommonConfig {
    /// Returns the process-wide configuration, loading it on first call.
    ///
    /// Reads the file named by `STORAGE_COMMON_CONFIG` when set, then applies
    /// environment overrides. Any failure logs a warning and keeps defaults.
    pub fn get() -> &'static CommonConfig {
        CONFIG.get_or_init(|| {
            let base = match std::env::var(CONFIG_FILE_ENV) {
                Ok(path) => Self::load(Path::new(&path)).unwrap_or_else(|e| {
                    tracing::warn!("Failed to load config file {}: {}. Using defaults.", path, e);
                    Self::default()
                }),
                Err(_) => Self::default(),
            };
            let fallback = base.clone();
            base.with_overrides(|key| std::env::var(key).ok())
                .unwrap_or_else(|e| {
                    tracing::warn!("Ignoring environment overrides: {}", e);
                    fallback
                })
        })
    }

    /// Load from a file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)?
        };
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PAGINATION_OVERFLOW_ENV) {
            self.pagination.overflow = parse_bool(PAGINATION_OVERFLOW_ENV, &raw)?;
        }
        if let Some(raw) = lookup(PAGINATION_MAX_LIMIT_ENV) {
            let limit: u64 = raw.trim().parse().map_err(|e| {
                StorageError::Config(format!("{PAGINATION_MAX_LIMIT_ENV}={raw}: {e}"))
            })?;
            // 0 disables the limit.
            self.pagination.max_limit = (limit > 0).then_some(limit);
        }
        if let Some(raw) = lookup(JSON_PRETTY_ENV) {
            self.json.pretty = parse_bool(JSON_PRETTY_ENV, &raw)?;
        }
        Ok(self)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StorageError::Config(format!("{key}={raw}: expected a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::DbType;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CommonConfig::default();
        assert!(!config.pagination.overflow);
        assert_eq!(config.pagination.max_limit, Some(500));
        assert!(!config.json.pretty);
    }

    #[test]
    fn test_load_yaml_with_partial_sections() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("common.yaml");
        std::fs::write(&path, "pagination:\n  overflow: true\n  db_type: mysql\n").unwrap();

        let config = CommonConfig::load(&path).unwrap();
        assert!(config.pagination.overflow);
        assert_eq!(config.pagination.max_limit, Some(500));
        assert_eq!(config.pagination.db_type, Some(DbType::MySql));
        assert_eq!(config.json, JsonConfig::default());
    }

    #[test]
    fn test_load_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("common.json");
        std::fs::write(&path, r#"{"json":{"pretty":true}}"#).unwrap();

        let config = CommonConfig::load(&path).unwrap();
        assert!(config.json.pretty);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = CommonConfig::load(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let config = CommonConfig::default()
            .with_overrides(env(&[
                (PAGINATION_OVERFLOW_ENV, "yes"),
                (PAGINATION_MAX_LIMIT_ENV, "0"),
                (JSON_PRETTY_ENV, "TRUE"),
            ]))
            .unwrap();
        assert!(config.pagination.overflow);
        assert_eq!(config.pagination.max_limit, None);
        assert!(config.json.pretty);
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let err = CommonConfig::default()
            .with_overrides(env(&[(PAGINATION_MAX_LIMIT_ENV, "lots")]))
            .unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }
}
