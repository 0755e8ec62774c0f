use crate::factory::node::SchemaNode;
use crate::factory::options::PluginWidgets;
use crate::factory::registry::BuildResult;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::{Number, Value as JsonValue};
use std::any::Any;

/// Leaves keep data their schema type cannot hold and write it back untouched
/// until the field is edited.
fn kept_error(kept: Option<&JsonValue>, expected: &str) -> Option<String> {
    match kept {
        Some(JsonValue::Null) | None => None,
        Some(v) => Some(format!("{v} is not a valid {expected}, kept as-is")),
    }
}

fn kept_display(kept: &JsonValue) -> String {
    match kept {
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Text field. The schema default is only a placeholder; the data is the value.
pub struct JsonString {
    name: String,
    value: String,
    kept: Option<JsonValue>,
    placeholder: Option<String>,
    present: bool,
}

impl JsonString {
    pub fn build(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let placeholder = node
            .default_value()
            .and_then(|d| d.as_str())
            .map(|s| s.to_string());
        let (value, kept) = match &node.data {
            Some(JsonValue::String(s)) => (s.clone(), None),
            None => (String::new(), None),
            Some(other) => (String::new(), Some(other.clone())),
        };
        Ok(Box::new(Self {
            name: node.name,
            value,
            kept,
            placeholder,
            present: node.data.is_some(),
        }))
    }
}

impl SchemaWidget for JsonString {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::String
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        match &self.kept {
            Some(v) => v.clone(),
            None => JsonValue::String(self.value.clone()),
        }
    }
    fn is_absent(&self) -> bool {
        !self.present
    }
    fn display_value(&self) -> Option<String> {
        Some(match &self.kept {
            Some(v) => kept_display(v),
            None => self.value.clone(),
        })
    }
    fn placeholder(&self) -> Option<String> {
        self.placeholder.clone()
    }
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        self.value = text.to_string();
        self.kept = None;
        self.present = true;
        Ok(())
    }
    fn error_text(&self) -> Option<String> {
        kept_error(self.kept.as_ref(), "string")
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct JsonInteger {
    name: String,
    value: i64,
    kept: Option<JsonValue>,
    present: bool,
}

impl JsonInteger {
    pub fn build(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let value = node
            .data
            .as_ref()
            .and_then(|d| d.as_i64())
            .or_else(|| node.default_value().and_then(|d| d.as_i64()))
            .unwrap_or(0);
        let kept = node.data.clone().filter(|d| d.as_i64().is_none());
        Ok(Box::new(Self {
            name: node.name,
            value,
            kept,
            present: node.data.is_some(),
        }))
    }
}

impl SchemaWidget for JsonInteger {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Integer
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        self.kept.clone().unwrap_or_else(|| JsonValue::from(self.value))
    }
    fn is_absent(&self) -> bool {
        !self.present
    }
    fn display_value(&self) -> Option<String> {
        Some(match &self.kept {
            Some(v) => kept_display(v),
            None => self.value.to_string(),
        })
    }
    fn error_text(&self) -> Option<String> {
        kept_error(self.kept.as_ref(), "integer")
    }
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        let v = text
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{}' expects an integer, got '{}'", self.name, text.trim()))?;
        self.value = v;
        self.kept = None;
        self.present = true;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Keeps the JSON number as-is so integral data stays integral.
pub struct JsonNumber {
    name: String,
    value: Number,
    kept: Option<JsonValue>,
    present: bool,
}

impl JsonNumber {
    pub fn build(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let value = node
            .data
            .as_ref()
            .and_then(|d| d.as_number().cloned())
            .or_else(|| node.default_value().and_then(|d| d.as_number().cloned()))
            .unwrap_or_else(|| Number::from(0));
        let kept = node.data.clone().filter(|d| !d.is_number());
        Ok(Box::new(Self {
            name: node.name,
            value,
            kept,
            present: node.data.is_some(),
        }))
    }
}

impl SchemaWidget for JsonNumber {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Number
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        self.kept
            .clone()
            .unwrap_or_else(|| JsonValue::Number(self.value.clone()))
    }
    fn is_absent(&self) -> bool {
        !self.present
    }
    fn display_value(&self) -> Option<String> {
        Some(match &self.kept {
            Some(v) => kept_display(v),
            None => self.value.to_string(),
        })
    }
    fn error_text(&self) -> Option<String> {
        kept_error(self.kept.as_ref(), "number")
    }
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        let t = text.trim();
        let parsed = match t.parse::<i64>() {
            Ok(i) => Some(Number::from(i)),
            Err(_) => t.parse::<f64>().ok().and_then(Number::from_f64),
        };
        self.value = parsed.ok_or_else(|| format!("'{}' expects a number, got '{t}'", self.name))?;
        self.kept = None;
        self.present = true;
        Ok(())
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct JsonBoolean {
    name: String,
    value: bool,
    kept: Option<JsonValue>,
    present: bool,
}

impl JsonBoolean {
    pub fn build(_factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let value = node
            .data
            .as_ref()
            .and_then(|d| d.as_bool())
            .or_else(|| node.default_value().and_then(|d| d.as_bool()))
            .unwrap_or(false);
        let kept = node.data.clone().filter(|d| !d.is_boolean());
        Ok(Box::new(Self {
            name: node.name,
            value,
            kept,
            present: node.data.is_some(),
        }))
    }
}

impl SchemaWidget for JsonBoolean {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Boolean
    }
    fn to_json_object(&self, _plugins: &PluginWidgets) -> JsonValue {
        self.kept.clone().unwrap_or(JsonValue::Bool(self.value))
    }
    fn is_absent(&self) -> bool {
        !self.present
    }
    fn display_value(&self) -> Option<String> {
        Some(match &self.kept {
            Some(v) => kept_display(v),
            None => self.value.to_string(),
        })
    }
    fn error_text(&self) -> Option<String> {
        kept_error(self.kept.as_ref(), "boolean")
    }
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        self.value = match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => true,
            "false" | "no" | "0" | "off" => false,
            other => return Err(format!("'{}' expects true/false, got '{other}'", self.name)),
        };
        self.kept = None;
        self.present = true;
        Ok(())
    }
    fn checked(&self) -> Option<bool> {
        Some(self.value)
    }
    fn set_checked(&mut self, checked: bool) -> bool {
        self.value = checked;
        self.kept = None;
        self.present = true;
        true
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}
