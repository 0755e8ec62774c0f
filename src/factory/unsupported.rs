use crate::error::SchemaError;
use crate::factory::node::SchemaNode;
use crate::factory::options::PluginWidgets;
use crate::factory::registry::BuildResult;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::Value as JsonValue;
use std::any::Any;
use tracing::warn;

/// Visible error in place of a fragment that could not be built. Serializes
/// `fallback` so the surrounding document keeps its shape.
pub struct SchemaErrorWidget {
    name: String,
    error: SchemaError,
    fallback: JsonValue,
    absent: bool,
}

impl SchemaErrorWidget {
    pub fn new(name: impl Into<String>, error: SchemaError, fallback: JsonValue) -> Self {
        let name = name.into();
        warn!(widget = %name, error = %error, "schema fragment rendered as error");
        Self {
            name,
            error,
            fallback,
            absent: false,
        }
    }

    pub fn boxed(
        name: impl Into<String>,
        error: SchemaError,
        fallback: JsonValue,
    ) -> Box<dyn SchemaWidget> {
        Box::new(Self::new(name, error, fallback))
    }

    /// Fallback constructor for fragments no resolver matched.
    pub fn unsupported(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let type_name = node
            .schema
            .get("type")
            .map(|t| match t {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "<none>".to_string());
        let error = SchemaError::UnsupportedType {
            name: node.name.clone(),
            type_name,
        };
        let absent = node.data.is_none();
        let mut w = Self::new(node.name, error, node.data.unwrap_or(JsonValue::Null));
        w.absent = absent;
        Ok(Box::new(w))
    }
}

impl SchemaWidget for SchemaErrorWidget {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        match self.error {
            SchemaError::UnsupportedType { .. } => WidgetKind::Unsupported,
            _ => WidgetKind::SchemaError,
        }
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        self.fallback.clone()
    }
    fn is_absent(&self) -> bool {
        self.absent
    }
    fn error_text(&self) -> Option<String> {
        Some(self.error.to_string())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}
