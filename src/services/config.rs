use crate::error::ConfigError;
use crate::model::{validate_client_config, ClientConfig};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "pipeline-client.yaml";
pub const CONFIG_DIR_ENV: &str = "PIPELINE_CLIENT_CONFIG_DIR";

/// A validated config plus the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ClientConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn resolve(&self, path: &str) -> PathBuf {
        resolve_path(&self.base_dir, path)
    }
}

pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let pb = PathBuf::from(path);
    if pb.is_absolute() {
        pb
    } else {
        base.join(pb)
    }
}

/// Load config anchored by PIPELINE_CLIENT_CONFIG_DIR or by discovering
/// pipeline-client.yaml from the current directory upwards.
pub fn load_client_config() -> Result<LoadedConfig, ConfigError> {
    if let Ok(base) = std::env::var(CONFIG_DIR_ENV) {
        return load_from_file(&PathBuf::from(base).join(CONFIG_FILE));
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let found = discover_config(&cwd).ok_or(ConfigError::NotFound)?;
    load_from_file(&found)
}

/// Look for `pipeline-client.yaml` or `.pipeline/pipeline-client.yaml` in
/// `start` and each of its ancestors.
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut cur = Some(start);
    while let Some(dir) = cur {
        for candidate in [
            dir.join(CONFIG_FILE),
            dir.join(".pipeline").join(CONFIG_FILE),
        ] {
            if candidate.exists() {
                return Some(candidate);
            }
        }
        cur = dir.parent();
    }
    None
}

pub fn load_from_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: ClientConfig = serde_yaml::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    validate_client_config(&config).map_err(ConfigError::Invalid)?;
    let base_dir = path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(LoadedConfig { config, base_dir })
}

/// Read a JSON or YAML document into a JSON value.
pub fn load_document(path: &Path) -> Result<JsonValue, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str::<JsonValue>(&s).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Items come inline from the config or from `items_path` (a list document).
pub fn load_items(loaded: &LoadedConfig) -> Result<Vec<JsonValue>, ConfigError> {
    match &loaded.config.items_path {
        Some(p) => match load_document(&loaded.resolve(p))? {
            JsonValue::Array(items) => Ok(items),
            _ => Err(ConfigError::Invalid(format!("{p} must contain a list of items"))),
        },
        None => Ok(loaded.config.items.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "host_cmd: ${HOST_BIN}\ndefinition: def.json\nitems_path: items.yaml\n";

    #[test]
    fn discovery_walks_up_to_dot_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".pipeline");
        fs::create_dir_all(&cfg_dir).unwrap();
        fs::write(cfg_dir.join(CONFIG_FILE), MINIMAL).unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        let found = discover_config(&nested).unwrap();
        assert_eq!(found, cfg_dir.join(CONFIG_FILE));
    }

    #[test]
    fn items_path_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), MINIMAL).unwrap();
        fs::write(
            dir.path().join("items.yaml"),
            "- {name: chair, context_id: c1}\n- {name: table, parent_id: p1}\n",
        )
        .unwrap();
        let loaded = load_from_file(&dir.path().join(CONFIG_FILE)).unwrap();
        let items = load_items(&loaded).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["parent_id"], serde_json::json!("p1"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "host_cmd: ''\ndefinition: def.json\nitems: [{}]\n").unwrap();
        let err = load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
