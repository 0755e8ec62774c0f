use crate::error::SchemaError;
use crate::factory::node::{resolve_all_of, SchemaNode};
use crate::factory::options::{PluginOptionsHost, PluginWidgets};
use crate::factory::registry::BuildResult;
use crate::factory::unsupported::SchemaErrorWidget;
use crate::factory::widget::{SchemaWidget, WidgetKind};
use crate::factory::WidgetFactory;
use serde_json::{Map, Value as JsonValue};
use std::any::Any;

/// Object fragment: one child per property, in display order. Data keys the
/// schema does not describe are kept and written back after the owned ones.
pub struct JsonObject {
    name: String,
    kind: WidgetKind,
    properties: Vec<Box<dyn SchemaWidget>>,
    extra: Map<String, JsonValue>,
    present: bool,
}

impl JsonObject {
    pub fn build(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        if node.is_plugin_delegate() {
            return build_plugin_host(factory, node);
        }
        Self::build_structural(factory, node, WidgetKind::Object)
    }

    /// `Plugin` / `Component` titled objects: any object declaring a
    /// `widget` property is rendered by the host-provided options widget.
    pub fn build_plugin_container(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        if node.declares_widget() {
            return build_plugin_host(factory, node);
        }
        Self::build_structural(factory, node, WidgetKind::PluginContainer)
    }

    fn build_structural(
        factory: &mut WidgetFactory,
        node: SchemaNode,
        kind: WidgetKind,
    ) -> BuildResult {
        let Some(props) = node.ordered_properties() else {
            return Ok(SchemaErrorWidget::boxed(
                node.name.clone(),
                SchemaError::MissingProperties { name: node.name },
                JsonValue::Object(Map::new()),
            ));
        };
        let mut properties = Vec::with_capacity(props.len());
        for (key, schema) in &props {
            let child = node.property(key, schema.clone());
            properties.push(factory.create_widget(child)?);
        }
        let mut extra = Map::new();
        if let Some(data) = node.data_object() {
            for (k, v) in data {
                if !props.iter().any(|(p, _)| p == k) {
                    extra.insert(k.clone(), v.clone());
                }
            }
        }
        Ok(Box::new(Self {
            name: node.name,
            kind,
            properties,
            extra,
            present: node.data.is_some(),
        }))
    }
}

fn build_plugin_host(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
    let role = node.role_name().unwrap_or_default().to_string();
    let mut plugin_data = node.data_object().cloned().unwrap_or_default();
    let widget_ref = factory.fetch_plugin_widget(&mut plugin_data, &role)?;
    Ok(Box::new(PluginOptionsHost::new(
        node.name,
        plugin_data,
        widget_ref,
    )))
}

impl SchemaWidget for JsonObject {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        self.kind
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        let mut out = Map::new();
        for w in &self.properties {
            if w.is_absent() {
                continue;
            }
            out.insert(w.name().to_string(), w.to_json_object(plugins));
        }
        for (k, v) in &self.extra {
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
        JsonValue::Object(out)
    }
    fn is_absent(&self) -> bool {
        !self.present && self.properties.iter().all(|p| p.is_absent())
    }
    fn child_count(&self) -> usize {
        self.properties.len()
    }
    fn child(&self, index: usize) -> Option<&dyn SchemaWidget> {
        self.properties.get(index).map(|w| w.as_ref())
    }
    fn child_mut(&mut self, index: usize) -> Option<&mut dyn SchemaWidget> {
        match self.properties.get_mut(index) {
            Some(w) => Some(w.as_mut() as &mut dyn SchemaWidget),
            None => None,
        }
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `allOf` fragment: members and siblings are merged into one schema and a
/// single child is built from it. Serialization is the child's, with data
/// keys the merged schema did not produce added back.
pub struct AllOfObject {
    name: String,
    inner: Box<dyn SchemaWidget>,
    data: Map<String, JsonValue>,
}

impl AllOfObject {
    pub fn build(factory: &mut WidgetFactory, node: SchemaNode) -> BuildResult {
        let merged = resolve_all_of(&node.schema);
        let data = node.data_object().cloned().unwrap_or_default();
        let inner = factory.create_widget(SchemaNode::new(
            node.name.clone(),
            merged,
            node.data,
            node.parent_data,
        ))?;
        Ok(Box::new(Self {
            name: node.name,
            inner,
            data,
        }))
    }
}

impl SchemaWidget for AllOfObject {
    fn name(&self) -> &str {
        &self.name
    }
    fn kind(&self) -> WidgetKind {
        WidgetKind::AllOf
    }
    fn to_json_object(&self, plugins: &PluginWidgets) -> JsonValue {
        let mut out = self.inner.to_json_object(plugins);
        if let Some(obj) = out.as_object_mut() {
            for (k, v) in &self.data {
                obj.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
        out
    }
    fn is_absent(&self) -> bool {
        self.inner.is_absent()
    }
    fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
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
    fn as_any(&self) -> &dyn Any {
        self
    }
}
