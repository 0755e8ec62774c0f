use crate::error::PluginResolutionError;
use crate::factory::options::OptionsWidget;
use crate::model::Status;
use crate::services::host::{HostConnection, WidgetRequest};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

/// Widget every host is expected to provide when a plugin ships none.
pub const DEFAULT_WIDGET: &str = "default.widget";

const NO_NAME: &str = "no name provided";
const NO_DESCRIPTION: &str = "No description provided";

/// Requests host-rendered options widgets for plugin nodes.
pub struct PluginWidgetBridge<'a> {
    pub host: &'a dyn HostConnection,
    pub ui_types: &'a [String],
    pub context: &'a JsonValue,
    pub definition_type: &'a str,
}

impl<'a> PluginWidgetBridge<'a> {
    pub fn plugin_type(&self, role: &str) -> String {
        format!("{}.{}", self.definition_type, role)
    }

    /// Resolve the options widget for `plugin_data`. Fills in `widget` from
    /// `plugin` when missing or empty.
    pub fn fetch(
        &self,
        plugin_data: &mut Map<String, JsonValue>,
        role: &str,
    ) -> Result<OptionsWidget, PluginResolutionError> {
        let plugin_name = str_field(plugin_data, "plugin");
        let widget_set = plugin_data
            .get("widget")
            .and_then(|w| w.as_str())
            .is_some_and(|w| !w.is_empty());
        if !widget_set {
            plugin_data.insert("widget".into(), JsonValue::String(plugin_name.clone()));
        }
        let widget_name = str_field(plugin_data, "widget");
        let plugin_type = self.plugin_type(role);
        let options = match plugin_data.get("options") {
            Some(JsonValue::Object(o)) => o.clone(),
            _ => Map::new(),
        };
        let name = plugin_data
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or(NO_NAME)
            .to_string();
        let description = plugin_data
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or(NO_DESCRIPTION)
            .to_string();

        // `plugin_name` carries the widget being looked up
        let mut req = WidgetRequest {
            plugin_name: widget_name.clone(),
            plugin_type: plugin_type.clone(),
            kind: "widget",
            host: String::new(),
            ui: String::new(),
            options: JsonValue::Object(options.clone()),
            name,
            description,
            context: self.context.clone(),
        };

        let mut response = self.ask(&mut req)?;
        if response.is_none() {
            info!(widget = %widget_name, plugin_type = %plugin_type, "no widget found, falling back to {DEFAULT_WIDGET}");
            req.plugin_name = DEFAULT_WIDGET.to_string();
            response = self.ask(&mut req)?;
        }
        let Some(env) = response else {
            return Err(PluginResolutionError::NoResponse {
                widget_name,
                plugin_type,
            });
        };
        if env.status == Status::Exception {
            return Err(PluginResolutionError::HostException {
                message: env.message.unwrap_or_default(),
                plugin_name,
                plugin_type,
                widget_name: req.plugin_name,
            });
        }
        OptionsWidget::from_response(&req.plugin_name, &plugin_name, &plugin_type, options, env.result)
    }

    /// First host/ui pair that answers, both lists walked from the back.
    fn ask(
        &self,
        req: &mut WidgetRequest,
    ) -> Result<Option<crate::services::host::Envelope>, PluginResolutionError> {
        for host in self.host.host_definitions().iter().rev() {
            for ui in self.ui_types.iter().rev() {
                req.host = host.clone();
                req.ui = ui.clone();
                debug!(widget = %req.plugin_name, host = %host, ui = %ui, "widget request");
                if let Some(env) = self.host.request_widget(req)? {
                    return Ok(Some(env));
                }
            }
        }
        Ok(None)
    }
}

fn str_field(data: &Map<String, JsonValue>, key: &str) -> String {
    data.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
