use crate::error::{ExecutionError, HostError};
use crate::model::Status;
use crate::services::event_hub::EventHub;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Reply to any host request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: JsonValue,
    #[serde(default)]
    pub traceback: Option<String>,
}

impl Envelope {
    pub fn success(result: JsonValue) -> Self {
        Self {
            status: Status::Success,
            message: None,
            result,
            traceback: None,
        }
    }

    pub fn failure(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            result: JsonValue::Null,
            traceback: None,
        }
    }
}

/// Request for a remotely rendered options widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetRequest {
    pub plugin_name: String,
    pub plugin_type: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub host: String,
    pub ui: String,
    pub options: JsonValue,
    pub name: String,
    pub description: String,
    pub context: JsonValue,
}

/// Connection to one running host. Blocking calls; the batch worker invokes
/// `run_definition` and `ensure_context` off the UI thread.
pub trait HostConnection: Send + Sync {
    fn id(&self) -> &str;
    fn host_definitions(&self) -> &[String];
    fn events(&self) -> Arc<EventHub>;
    /// `Ok(None)` means no plugin answered for this host/ui pair.
    fn request_widget(&self, req: &WidgetRequest) -> Result<Option<Envelope>, HostError>;
    fn run_definition(
        &self,
        definition: &JsonValue,
        engine_type: &str,
    ) -> Result<Envelope, HostError>;
    /// Return the id of the context `name` under `parent_id`, creating it if needed.
    fn ensure_context(&self, parent_id: &str, name: &str) -> Result<String, HostError>;
}

/// Map a host envelope to the execution outcome. A run that still reports
/// `RUNNING` at completion is treated as failed.
pub fn classify(env: Envelope) -> Result<JsonValue, ExecutionError> {
    match env.status {
        Status::Success | Status::Warning => Ok(env.result),
        other => {
            let message = env
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("host reported {other}"));
            Err(ExecutionError::new(message).with_traceback(env.traceback))
        }
    }
}
