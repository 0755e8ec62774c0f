use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Status carried by host envelopes and async widget updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "SUCCESS", alias = "SUCCESS_STATUS")]
    Success,
    #[serde(rename = "ERROR", alias = "ERROR_STATUS")]
    Error,
    #[serde(rename = "EXCEPTION", alias = "EXCEPTION_STATUS")]
    Exception,
    #[serde(rename = "RUNNING", alias = "RUNNING_STATUS")]
    Running,
    #[serde(rename = "WARNING", alias = "WARNING_STATUS")]
    Warning,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Error => "ERROR",
            Status::Exception => "EXCEPTION",
            Status::Running => "RUNNING",
            Status::Warning => "WARNING",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Status::Error | Status::Exception)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_host_id")]
    pub host_id: String,
    /// Command line used for every host round-trip; `${VAR}` is expanded.
    pub host_cmd: String,
    #[serde(default = "default_host_definitions")]
    pub host_definitions: Vec<String>,
    #[serde(default = "default_ui_types")]
    pub ui_types: Vec<String>,
    #[serde(default = "default_definition_type")]
    pub definition_type: String,
    // Paths below are relative to the config directory unless absolute
    #[serde(default)]
    pub schema: Option<String>,
    pub definition: String,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub items: Vec<JsonValue>,
    #[serde(default)]
    pub items_path: Option<String>,
    #[serde(default = "default_true")]
    pub multithreading: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub engine_type: Option<String>,
    #[serde(default)]
    pub context: JsonValue,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_id: default_host_id(),
            host_cmd: String::new(),
            host_definitions: default_host_definitions(),
            ui_types: default_ui_types(),
            definition_type: default_definition_type(),
            schema: None,
            definition: String::new(),
            package: None,
            items: vec![],
            items_path: None,
            multithreading: true,
            poll_interval_ms: default_poll_interval_ms(),
            engine_type: None,
            context: JsonValue::Null,
        }
    }
}

fn default_host_id() -> String {
    "local".to_string()
}

fn default_host_definitions() -> Vec<String> {
    vec!["python".to_string()]
}

fn default_ui_types() -> Vec<String> {
    vec!["core".to_string(), "tui".to_string()]
}

fn default_definition_type() -> String {
    "publisher".to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    250
}

pub(crate) fn validate_client_config(cfg: &ClientConfig) -> Result<(), String> {
    if cfg.host_cmd.trim().is_empty() {
        return Err("host_cmd must not be empty".to_string());
    }
    if cfg.definition.trim().is_empty() {
        return Err("definition must name a definition file".to_string());
    }
    if cfg.host_definitions.is_empty() {
        return Err("host_definitions must list at least one host type".to_string());
    }
    if cfg.ui_types.is_empty() {
        return Err("ui_types must list at least one ui type".to_string());
    }
    if cfg.definition_type.contains('.') {
        return Err(format!(
            "definition_type '{}' must not contain '.'",
            cfg.definition_type
        ));
    }
    if cfg.poll_interval_ms == 0 || cfg.poll_interval_ms > 60_000 {
        return Err(format!(
            "poll_interval_ms out of range: {}",
            cfg.poll_interval_ms
        ));
    }
    if !(cfg.context.is_null() || cfg.context.is_object()) {
        return Err("context must be a mapping".to_string());
    }
    if cfg.items.is_empty() && cfg.items_path.is_none() {
        return Err("either items or items_path must be provided".to_string());
    }
    if !cfg.items.is_empty() && cfg.items_path.is_some() {
        return Err("items and items_path are mutually exclusive".to_string());
    }
    for (i, item) in cfg.items.iter().enumerate() {
        if !item.is_object() {
            return Err(format!("item at index {i} must be a mapping"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> ClientConfig {
        ClientConfig {
            host_cmd: "${HOST_BIN} serve".into(),
            definition: "definition.json".into(),
            items: vec![json!({"name": "a"})],
            ..Default::default()
        }
    }

    #[test]
    fn status_accepts_constant_style_aliases() {
        let s: Status = serde_json::from_value(json!("SUCCESS_STATUS")).unwrap();
        assert_eq!(s, Status::Success);
        let s: Status = serde_json::from_value(json!("EXCEPTION")).unwrap();
        assert_eq!(s, Status::Exception);
        let s: Status = serde_json::from_value(json!("WARNING_STATUS")).unwrap();
        assert_eq!(s, Status::Warning);
        assert!(serde_json::from_value::<Status>(json!("bogus")).is_err());
        assert!(Status::Error.is_failure());
        assert!(!Status::Running.is_failure());
    }

    #[test]
    fn yaml_defaults_are_applied() {
        let cfg: ClientConfig = serde_yaml::from_str(
            "host_cmd: host run\ndefinition: def.json\nitems:\n  - {name: chair}\n",
        )
        .unwrap();
        assert!(cfg.multithreading);
        assert_eq!(cfg.poll_interval_ms, 250);
        assert_eq!(cfg.definition_type, "publisher");
        assert_eq!(cfg.host_definitions, vec!["python".to_string()]);
        assert!(validate_client_config(&cfg).is_ok());
    }

    #[test]
    fn validate_requires_items_source() {
        let cfg = ClientConfig {
            items: vec![],
            ..base()
        };
        let err = validate_client_config(&cfg).unwrap_err();
        assert!(err.contains("items"));
    }

    #[test]
    fn validate_rejects_dotted_definition_type() {
        let cfg = ClientConfig {
            definition_type: "publisher.x".into(),
            ..base()
        };
        let err = validate_client_config(&cfg).unwrap_err();
        assert!(err.contains("must not contain"));
    }
}
