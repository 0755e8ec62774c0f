use crate::error::PluginResolutionError;
use crate::factory::widget::{SchemaWidget, WidgetKind, WidgetRef};
use crate::model::Status;
use serde_json::{json, Map, Value as JsonValue};
use std::any::Any;
use std::collections::HashMap;

/// Host-provided options editor for one plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsWidget {
    pub widget_name: String,
    pub plugin_name: String,
    pub plugin_type: String,
    pub options: Map<String, JsonValue>,
    pub status: Option<Status>,
    pub message: Option<String>,
    pub result: JsonValue,
}

impl OptionsWidget {
    /// Validate a widget response. The result must describe an options
    /// widget (a JSON object); its `options`, if any, override the plugin's.
    pub fn from_response(
        widget_name: &str,
        plugin_name: &str,
        plugin_type: &str,
        initial_options: Map<String, JsonValue>,
        result: JsonValue,
    ) -> Result<Self, PluginResolutionError> {
        let contract = |reason: &str| PluginResolutionError::Contract {
            widget_name: widget_name.to_string(),
            plugin_type: plugin_type.to_string(),
            reason: reason.to_string(),
        };
        let JsonValue::Object(desc) = result else {
            return Err(contract("result is not an options widget description"));
        };
        let mut options = initial_options;
        match desc.get("options") {
            None | Some(JsonValue::Null) => {}
            Some(JsonValue::Object(o)) => {
                for (k, v) in o {
                    options.insert(k.clone(), v.clone());
                }
            }
            Some(_) => return Err(contract("'options' must be a mapping")),
        }
        Ok(Self {
            widget_name: widget_name.to_string(),
            plugin_name: plugin_name.to_string(),
            plugin_type: plugin_type.to_string(),
            options,
            status: None,
            message: None,
            result: JsonValue::Null,
        })
    }

    pub fn set_status(&mut self, status: Status, message: Option<String>, result: JsonValue) {
        self.status = Some(status);
        self.message = message;
        if !result.is_null() {
            self.result = result;
        }
    }

    /// Edit one option from text: valid JSON is taken as-is, anything else
    /// becomes a string.
    pub fn set_option_text(&mut self, key: &str, text: &str) {
        let value = serde_json::from_str::<JsonValue>(text.trim())
            .unwrap_or_else(|_| JsonValue::String(text.to_string()));
        self.options.insert(key.to_string(), value);
    }

    pub fn to_json_object(&self) -> JsonValue {
        json!({ "options": self.options })
    }
}

/// Registry of options widgets owned by one factory.
#[derive(Debug, Default)]
pub struct PluginWidgets {
    widgets: HashMap<WidgetRef, OptionsWidget>,
}

impl PluginWidgets {
    pub fn register(&mut self, widget: OptionsWidget) -> WidgetRef {
        let r = WidgetRef::generate();
        self.widgets.insert(r.clone(), widget);
        r
    }

    pub fn get(&self, r: &WidgetRef) -> Option<&OptionsWidget> {
        self.widgets.get(r)
    }

    pub fn get_mut(&mut self, r: &WidgetRef) -> Option<&mut OptionsWidget> {
        self.widgets.get_mut(r)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn clear(&mut self) {
        self.widgets.clear();
    }
}

/// Tree node standing in for a plugin: holds the plugin data (with its
/// `widget_ref`) and serializes through the registered options widget.
pub struct PluginOptionsHost {
    name: String,
    plugin_data: Map<String, JsonValue>,
    widget_ref: WidgetRef,
}

impl PluginOptionsHost {
    pub fn new(
        name: impl Into<String>,
        plugin_data: Map<String, JsonValue>,
        widget_ref: WidgetRef,
    ) -> Self {
        Self {
            name: name.into(),
            plugin_data,
            widget_ref,
        }
    }

    pub fn widget_ref(&self) -> &WidgetRef {
        &self.widget_ref
    }
}

impl SchemaWidget for PluginOptionsHost {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::PluginOptions
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        let mut out = match plugins.get(&self.widget_ref).map(|w| w.to_json_object()) {
            Some(JsonValue::Object(o)) => o,
            _ => Map::new(),
        };
        for (k, v) in &self.plugin_data {
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
        JsonValue::Object(out)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_options_override_plugin_options() {
        let mut initial = Map::new();
        initial.insert("path".into(), json!("/tmp/a"));
        initial.insert("mode".into(), json!("fast"));
        let w = OptionsWidget::from_response(
            "file_collector",
            "collector",
            "publisher.collector",
            initial,
            json!({"options": {"mode": "safe"}}),
        )
        .unwrap();
        assert_eq!(w.options["path"], json!("/tmp/a"));
        assert_eq!(w.options["mode"], json!("safe"));
    }

    #[test]
    fn non_object_result_breaks_contract() {
        let err = OptionsWidget::from_response("w", "p", "publisher.x", Map::new(), json!("nope"))
            .unwrap_err();
        assert!(matches!(err, PluginResolutionError::Contract { .. }));
    }

    #[test]
    fn option_text_parses_json_or_keeps_string() {
        let mut w = OptionsWidget::from_response("w", "p", "t", Map::new(), json!({})).unwrap();
        w.set_option_text("n", "42");
        w.set_option_text("s", "hello world");
        assert_eq!(w.options["n"], json!(42));
        assert_eq!(w.options["s"], json!("hello world"));
    }
}
