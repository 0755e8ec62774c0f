use crate::factory::array::build_elements;
use crate::factory::node::SchemaNode;
use crate::factory::options::PluginWidgets;
use crate::factory::registry::BuildResult;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::Value as JsonValue;
use std::any::Any;

/// Stage names that get a check box controlling their `enabled` flag.
pub const TOGGLEABLE_STAGES: [&str; 2] = ["validator", "output"];

/// Collapsible wrapper around one array element.
pub struct Accordion {
    name: String,
    inner: Box<dyn SchemaWidget>,
    checkable: bool,
    checked: bool,
    writes_enabled: bool,
}

impl Accordion {
    pub fn new(name: impl Into<String>, inner: Box<dyn SchemaWidget>) -> Self {
        Self {
            name: name.into(),
            inner,
            checkable: false,
            checked: true,
            writes_enabled: false,
        }
    }

    pub fn checkable(mut self, checked: bool) -> Self {
        self.checkable = true;
        self.checked = checked;
        self
    }

    fn enabled_flag(mut self) -> Self {
        self.writes_enabled = true;
        self
    }

    pub fn is_included(&self) -> bool {
        !self.checkable || self.checked
    }
}

impl SchemaWidget for Accordion {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Accordion
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        let mut out = self.inner.to_json_object(plugins);
        if self.writes_enabled {
            if let Some(obj) = out.as_object_mut() {
                obj.insert("enabled".to_string(), JsonValue::Bool(self.checked));
            }
        }
        out
    }
    fn child_count(&self) -> usize {
        1
    }
    fn child(&self, index: usize) -> Option<&dyn SchemaWidget> {
        (index == 0).then_some(self.inner.as_ref())
    }
    fn child_mut(&mut self, index: usize) -> Option<&mut dyn SchemaWidget> {
        if index == 0 {
            Some(self.inner.as_mut() as &mut dyn SchemaWidget)
        } else {
            None
        }
    }
    fn checked(&self) -> Option<bool> {
        self.checkable.then_some(self.checked)
    }
    fn set_checked(&mut self, checked: bool) -> bool {
        if !self.checkable {
            return false;
        }
        self.checked = checked;
        true
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared shape of the two accordion arrays.
struct AccordionArray {
    name: String,
    kind: WidgetKind,
    elements: Vec<Accordion>,
    present: bool,
}

impl SchemaWidget for AccordionArray {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        self.kind
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        // Unchecked components are left out; stages always serialize
        JsonValue::Array(
            self.elements
                .iter()
                .filter(|a| a.writes_enabled || a.is_included())
                .map(|a| a.to_json_object(plugins))
                .collect(),
        )
    }
    fn is_absent(&self) -> bool {
        !self.present
    }
    fn child_count(&self) -> usize {
        self.elements.len()
    }
    fn child(&self, index: usize) -> Option<&dyn SchemaWidget> {
        self.elements.get(index).map(|a| a as &dyn SchemaWidget)
    }
    fn child_mut(&mut self, index: usize) -> Option<&mut dyn SchemaWidget> {
        match self.elements.get_mut(index) {
            Some(a) => Some(a as &mut dyn SchemaWidget),
            None => None,
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `components`: each element in an accordion, checkable when the package
/// marks the component optional.
pub fn build_components(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
    let built = build_elements(factory, &node)?;
    let elements = built
        .into_iter()
        .map(|(name, widget, _)| {
            let acc = Accordion::new(name.clone(), widget);
            if factory.is_optional_component(&name) {
                acc.checkable(true)
            } else {
                acc
            }
        })
        .collect();
    Ok(Box::new(AccordionArray {
        present: node.data.is_some(),
        name: node.name,
        kind: WidgetKind::Components,
        elements,
    }))
}

/// `stages`: positional like a plain array; validator and output stages get
/// a check box seeded from and written to `enabled`.
pub fn build_stages(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
    let built = build_elements(factory, &node)?;
    let elements = built
        .into_iter()
        .map(|(name, widget, data)| {
            let acc = Accordion::new(name.clone(), widget);
            if TOGGLEABLE_STAGES.contains(&name.as_str()) {
                let enabled = data.get("enabled").and_then(|e| e.as_bool()).unwrap_or(true);
                acc.checkable(enabled).enabled_flag()
            } else {
                acc
            }
        })
        .collect();
    Ok(Box::new(AccordionArray {
        present: node.data.is_some(),
        name: node.name,
        kind: WidgetKind::Stages,
        elements,
    }))
}
