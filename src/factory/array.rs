use crate::factory::node::SchemaNode;
use crate::factory::options::PluginWidgets;
use crate::factory::registry::BuildResult;
use crate::factory::unsupported::SchemaErrorWidget;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::Value as JsonValue;
use std::any::Any;

/// Build one widget per data element. With `items.oneOf` the Nth element
/// uses the Nth entry; an element past the end of `oneOf` becomes an error
/// widget that keeps the element data.
pub(crate) fn build_elements(
    factory: &mut WidgetFactory,
    node: &SchemaNode,
) -> Result<Vec<(String, Box<dyn SchemaWidget>, JsonValue)>, crate::error::PluginResolutionError> {
    let mut out = Vec::new();
    if !node.has_items_schema() {
        return Ok(out);
    }
    for (index, (name, data)) in node.elements().into_iter().enumerate() {
        let widget = match node.element_schema(index) {
            Ok(schema) => factory.create_widget(node.element(name.clone(), schema, data.clone()))?,
            Err(e) => SchemaErrorWidget::boxed(name.clone(), e, data.clone()),
        };
        out.push((name, widget, data));
    }
    Ok(out)
}

pub struct JsonArray {
    name: String,
    elements: Vec<Box<dyn SchemaWidget>>,
    present: bool,
}

impl JsonArray {
    pub fn build(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let elements = build_elements(factory, &node)?
            .into_iter()
            .map(|(_, w, _)| w)
            .collect();
        Ok(Box::new(Self {
            name: node.name,
            elements,
            present: node.data.is_some(),
        }))
    }
}

impl SchemaWidget for JsonArray {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::Array
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        JsonValue::Array(
            self.elements
                .iter()
                .map(|w| w.to_json_object(plugins))
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
        self.elements.get(index).map(|w| w.as_ref())
    }
    fn child_mut(&mut self, index: usize) -> Option<&mut dyn SchemaWidget> {
        match self.elements.get_mut(index) {
            Some(w) => Some(w.as_mut() as &mut dyn SchemaWidget),
            None => None,
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}
