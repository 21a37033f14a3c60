//! Load stack config from a JSON document, then layer environment overrides on top.

use crate::config::StackConfig;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Read a JSON stack config. A relative `asset_root` is resolved against the file's directory.
pub fn load_from_path(path: &Path) -> Result<StackConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut config: StackConfig = serde_json::from_str(&raw)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if config.asset_root.is_relative() {
        if let Some(parent) = path.parent() {
            config.asset_root = parent.join(&config.asset_root);
        }
    }
    tracing::debug!(path = %path.display(), stack = %config.stack_name, "loaded stack config");
    Ok(config)
}

/// Apply `POLYGONE_*` overrides from the process environment.
pub fn apply_env_overrides(config: &mut StackConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

pub fn apply_overrides<F>(config: &mut StackConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(v) = get("POLYGONE_STACK_NAME") {
        config.stack_name = v;
    }
    if let Some(v) = get("POLYGONE_ASSET_ROOT") {
        config.asset_root = PathBuf::from(v);
    }
    if let Some(v) = get("POLYGONE_API_NAME") {
        config.api.name = v;
    }
    if let Some(v) = get("POLYGONE_DB_NAME") {
        config.database.database_name = v;
    }
    if let Some(v) = get("POLYGONE_FUNCTION_MEMORY") {
        match v.parse() {
            Ok(mb) => config.function.memory_size = mb,
            Err(_) => tracing::warn!(value = %v, "ignoring non-numeric POLYGONE_FUNCTION_MEMORY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn relative_asset_root_follows_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.json");
        std::fs::write(&path, r#"{ "stack_name": "Staging", "asset_root": "app" }"#).unwrap();

        let config = load_from_path(&path).unwrap();
        assert_eq!(config.stack_name, "Staging");
        assert_eq!(config.asset_root, dir.path().join("app"));
    }

    #[test]
    fn unreadable_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn malformed_json_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.json");
        std::fs::write(&path, r#"{ "api": { "authorization": "OPENID" } }"#).unwrap();
        assert!(matches!(load_from_path(&path), Err(ConfigError::Load(_))));
    }

    #[test]
    fn overrides_replace_selected_fields() {
        let vars: HashMap<&str, &str> = [
            ("POLYGONE_STACK_NAME", "PolygoneProd"),
            ("POLYGONE_DB_NAME", "PolygoneProdDB"),
            ("POLYGONE_FUNCTION_MEMORY", "2048"),
            ("POLYGONE_API_NAME", ""),
        ]
        .into_iter()
        .collect();
        let mut config = StackConfig::default();
        apply_overrides(&mut config, |k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.stack_name, "PolygoneProd");
        assert_eq!(config.database.database_name, "PolygoneProdDB");
        assert_eq!(config.function.memory_size, 2048);
        assert_eq!(config.api.name, "polygone-api");
    }

    #[test]
    fn non_numeric_memory_override_is_ignored() {
        let mut config = StackConfig::default();
        apply_overrides(&mut config, |k| {
            (k == "POLYGONE_FUNCTION_MEMORY").then(|| "lots".to_string())
        });
        assert_eq!(config.function.memory_size, 1024);
    }
}
