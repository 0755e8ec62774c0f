use crate::factory::node::SchemaNode;
use crate::factory::options::PluginWidgets;
use crate::factory::registry::BuildResult;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::Value as JsonValue;
use std::any::Any;

/// Bookkeeping field (`_config`, `type`, `enabled`, ...): never rendered,
/// its data is carried through unchanged.
pub struct Hidden {
    name: String,
    data: Option<JsonValue>,
}

impl Hidden {
    pub fn build(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        Ok(Box::new(Self {
            name: node.name,
            data: node.data,
        }))
    }
}

impl SchemaWidget for Hidden {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Hidden
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        self.data.clone().unwrap_or(JsonValue::Null)
    }
    fn is_absent(&self) -> bool {
        self.data.is_none()
    }
    fn is_hidden(&self) -> bool {
        true
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}
