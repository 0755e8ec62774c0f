use crate::definition::set_context_option;
use crate::error::PrepareError;
use crate::services::host::HostConnection;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-item preparation run on the worker before the definition is submitted.
pub trait ItemPreparer: Send + Sync {
    fn prepare(
        &self,
        item_id: &str,
        item: &JsonValue,
        definition: JsonValue,
    ) -> Result<JsonValue, PrepareError>;
}

/// Points the definition's context plugins at the item's context, creating
/// that context under `parent_id` when the item only names it.
pub struct ContextPreparer {
    host: Arc<dyn HostConnection>,
    default_context_id: Option<String>,
}

impl ContextPreparer {
    pub fn new(host: Arc<dyn HostConnection>, default_context_id: Option<String>) -> Self {
        Self {
            host,
            default_context_id,
        }
    }

    fn context_id(&self, item_id: &str, item: &JsonValue) -> Result<String, PrepareError> {
        let field = |k: &str| item.get(k).and_then(|v| v.as_str()).filter(|s| !s.is_empty());
        if let Some(id) = field("context_id") {
            return Ok(id.to_string());
        }
        if let (Some(parent_id), Some(name)) = (field("parent_id"), field("name")) {
            info!(item = item_id, parent_id, name, "ensuring context");
            return self
                .host
                .ensure_context(parent_id, name)
                .map_err(|e| PrepareError::ContextSynthesis {
                    parent_id: parent_id.to_string(),
                    name: name.to_string(),
                    reason: e.to_string(),
                });
        }
        self.default_context_id
            .clone()
            .ok_or_else(|| PrepareError::MissingContext {
                item_id: item_id.to_string(),
            })
    }
}

impl ItemPreparer for ContextPreparer {
    fn prepare(
        &self,
        item_id: &str,
        item: &JsonValue,
        mut definition: JsonValue,
    ) -> Result<JsonValue, PrepareError> {
        let context_id = self.context_id(item_id, item)?;
        let touched = set_context_option(&mut definition, &context_id);
        debug!(item = item_id, context_id = %context_id, plugins = touched, "context injected");
        Ok(definition)
    }
}
