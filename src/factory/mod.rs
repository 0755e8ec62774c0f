//! Schema-driven form tree. A [`WidgetFactory`] turns a definition schema and
//! its data into a tree of [`SchemaWidget`]s, resolving one constructor per
//! fragment through its [`OverrideRegistry`], and serializes the edited tree
//! back into definition JSON.

pub mod array;
pub mod bridge;
pub mod hidden;
pub mod leaf;
pub mod node;
pub mod object;
pub mod options;
pub mod overrides;
pub mod registry;
pub mod rows;
pub mod unsupported;
pub mod widget;


use crate::error::PluginResolutionError;
use crate::services::event_hub::{StatusUpdate, Subscription, TopicFilter};
use crate::services::host::HostConnection;
use bridge::PluginWidgetBridge;
use node::SchemaNode;
use options::PluginWidgets;
use registry::{BuildResult, OverrideRegistry};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, info, warn};
use widget::{SchemaWidget, WidgetRef};

pub struct WidgetFactory {
    registry: OverrideRegistry,
    ui_types: Vec<String>,
    host: Option<Arc<dyn HostConnection>>,
    context: JsonValue,
    definition_type: String,
    package: Option<JsonValue>,
    root: Option<Box<dyn SchemaWidget>>,
    plugins: PluginWidgets,
    subscription: Option<Subscription>,
    has_error: bool,
}

impl WidgetFactory {
    pub fn new(registry: OverrideRegistry, ui_types: Vec<String>) -> Self {
        Self {
            registry,
            ui_types,
            host: None,
            context: JsonValue::Object(Map::new()),
            definition_type: "publisher".to_string(),
            package: None,
            root: None,
            plugins: PluginWidgets::default(),
            subscription: None,
            has_error: false,
        }
    }

    pub fn with_host(mut self, host: Arc<dyn HostConnection>) -> Self {
        self.set_host(host);
        self
    }

    pub fn set_host(&mut self, host: Arc<dyn HostConnection>) {
        self.end_widget_updates();
        self.host = Some(host);
    }

    pub fn set_context(&mut self, context: JsonValue) {
        self.context = context;
    }

    pub fn set_package(&mut self, package: Option<JsonValue>) {
        self.package = package;
    }

    pub fn set_definition_type(&mut self, definition_type: impl Into<String>) {
        self.definition_type = definition_type.into();
    }

    /// The package marks a component optional with `optional: true`.
    pub fn is_optional_component(&self, name: &str) -> bool {
        self.package
            .as_ref()
            .and_then(|p| p.get("components"))
            .and_then(|c| c.as_array())
            .map(|components| {
                components.iter().any(|c| {
                    c.get("name").and_then(|n| n.as_str()) == Some(name)
                        && c.get("optional").and_then(|o| o.as_bool()).unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    pub fn create_widget(&mut self, node: SchemaNode) -> BuildResult {
        let ctor = self.registry.resolve(&node);
        ctor(self, node)
    }

    pub fn build(
        &mut self,
        name: &str,
        schema: JsonValue,
        data: Option<JsonValue>,
        parent_data: Option<JsonValue>,
    ) -> BuildResult {
        self.create_widget(SchemaNode::new(name, schema, data, parent_data))
    }

    /// Build the form for a whole definition, replacing any previous tree
    /// and its plugin widgets.
    pub fn build_definition_ui(
        &mut self,
        schema: &JsonValue,
        definition: &JsonValue,
    ) -> Result<(), PluginResolutionError> {
        self.plugins.clear();
        self.root = None;
        self.has_error = false;
        if self.package.is_none() {
            self.package = definition.get("package").cloned();
        }
        let name = definition
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or("definition")
            .to_string();
        let root = self.build(&name, schema.clone(), Some(definition.clone()), None)?;
        info!(
            definition = %name,
            plugin_widgets = self.plugins.len(),
            "definition form built"
        );
        self.root = Some(root);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&dyn SchemaWidget> {
        self.root.as_deref()
    }

    pub fn to_json_object(&self) -> Option<JsonValue> {
        self.root.as_ref().map(|r| r.to_json_object(&self.plugins))
    }

    pub fn plugin_widgets(&self) -> &PluginWidgets {
        &self.plugins
    }

    /// Resolve and register the options widget for one plugin; the new
    /// handle is written to `plugin_data.widget_ref`.
    pub fn fetch_plugin_widget(
        &mut self,
        plugin_data: &mut Map<String, JsonValue>,
        role: &str,
    ) -> Result<WidgetRef, PluginResolutionError> {
        let host = self
            .host
            .clone()
            .ok_or(PluginResolutionError::NoHostConnection)?;
        let widget = PluginWidgetBridge {
            host: host.as_ref(),
            ui_types: &self.ui_types,
            context: &self.context,
            definition_type: &self.definition_type,
        }
        .fetch(plugin_data, role)?;
        let widget_ref = self.plugins.register(widget);
        plugin_data.insert(
            "widget_ref".to_string(),
            JsonValue::String(widget_ref.to_string()),
        );
        Ok(widget_ref)
    }

    /// Start receiving status updates from this factory's host connection.
    pub fn listen_widget_updates(&mut self) {
        let Some(host) = &self.host else {
            debug!("no host connection, not listening for widget updates");
            return;
        };
        let hub = host.events();
        self.subscription = Some(hub.subscribe(TopicFilter::widget_updates(host.id())));
    }

    pub fn end_widget_updates(&mut self) {
        self.subscription = None;
    }

    #[cfg(test)]
    pub fn is_listening(&self) -> bool {
        self.subscription.is_some()
    }

    /// Apply everything delivered since the last call. Returns the updates
    /// that matched one of this factory's widgets.
    pub fn pump_status_updates(&mut self) -> Vec<StatusUpdate> {
        let updates = match &self.subscription {
            Some(s) => s.drain(),
            None => return Vec::new(),
        };
        updates
            .into_iter()
            .filter(|u| self.apply_status_update(u))
            .collect()
    }

    pub fn apply_status_update(&mut self, update: &StatusUpdate) -> bool {
        let r = WidgetRef::from(update.widget_ref.as_str());
        let Some(widget) = self.plugins.get_mut(&r) else {
            debug!(widget_ref = %update.widget_ref, "status update for unknown widget dropped");
            return false;
        };
        if let Some(status) = update.status {
            if status.is_failure() {
                warn!(
                    widget = %widget.widget_name,
                    status = %status,
                    message = update.message.as_deref().unwrap_or(""),
                    "plugin reported failure"
                );
                self.has_error = true;
            }
            widget.set_status(status, update.message.clone(), update.result.clone());
        } else if update.message.is_some() {
            widget.message = update.message.clone();
        }
        true
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn reset_error(&mut self) {
        self.has_error = false;
    }

    pub fn widget_at_mut(&mut self, path: &[usize]) -> Option<&mut dyn SchemaWidget> {
        let mut cur: &mut dyn SchemaWidget = self.root.as_deref_mut()?;
        for &i in path {
            cur = cur.child_mut(i)?;
        }
        Some(cur)
    }

    pub fn set_leaf_text(&mut self, path: &[usize], text: &str) -> Result<(), String> {
        match self.widget_at_mut(path) {
            Some(w) => w.set_text(text),
            None => Err("no such field".to_string()),
        }
    }

    /// Flip a check box; returns the new state.
    pub fn toggle(&mut self, path: &[usize]) -> Option<bool> {
        let w = self.widget_at_mut(path)?;
        let next = !w.checked()?;
        w.set_checked(next).then_some(next)
    }

    pub fn set_plugin_option(&mut self, widget_ref: &WidgetRef, key: &str, text: &str) -> bool {
        match self.plugins.get_mut(widget_ref) {
            Some(w) => {
                w.set_option_text(key, text);
                true
            }
            None => false,
        }
    }
}
