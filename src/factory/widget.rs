use crate::factory::options::PluginWidgets;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use uuid::Uuid;

/// Opaque handle of a registered plugin options widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetRef(String);

impl WidgetRef {
    pub fn generate() -> Self {
        WidgetRef(Uuid::new_v4().simple().to_string())
    }
}

impl From<&str> for WidgetRef {
    fn from(s: &str) -> Self {
        WidgetRef(s.to_string())
    }
}

impl fmt::Display for WidgetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Object,
    AllOf,
    PluginContainer,
    PluginOptions,
    Array,
    Components,
    Stages,
    Accordion,
    String,
    Integer,
    Number,
    Boolean,
    Hidden,
    Unsupported,
    SchemaError,
}

/// A node of the live form tree built from a schema fragment.
pub trait SchemaWidget: Any {
    fn name(&self) -> &str;
    fn kind(&self) -> WidgetKind;

    /// Rebuild the fragment data from the widget state.
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue;

    /// True when the widget had no data and nothing was edited; the enclosing
    /// object then leaves the key out.
    fn is_absent(&self) -> bool {
        false
    }

    fn is_hidden(&self) -> bool {
        false
    }

    fn child_count(&self) -> usize {
        0
    }

    fn child(&self, _index: usize) -> Option<&dyn SchemaWidget> {
        None
    }

    fn child_mut(&mut self, _index: usize) -> Option<&mut dyn SchemaWidget> {
        None
    }

    fn display_value(&self) -> Option<String> {
        None
    }

    /// Hint shown while the value is empty.
    fn placeholder(&self) -> Option<String> {
        None
    }

    fn set_text(&mut self, _text: &str) -> Result<(), String> {
        Err(format!("'{}' is not editable", self.name()))
    }

    fn error_text(&self) -> Option<String> {
        None
    }

    /// `Some` for widgets carrying a check box.
    fn checked(&self) -> Option<bool> {
        None
    }

    fn set_checked(&mut self, _checked: bool) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_refs_are_unique_hex() {
        let a = WidgetRef::generate();
        let b = WidgetRef::generate();
        assert_ne!(a, b);
        let text = a.to_string();
        assert_eq!(text.len(), 32);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
