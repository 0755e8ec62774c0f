//! In-process host used by unit tests.

use crate::error::HostError;
use crate::model::Status;
use crate::services::event_hub::{EventHub, StatusUpdate, WIDGET_UPDATE_TOPIC};
use crate::services::host::{Envelope, HostConnection, WidgetRequest};
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Lets a scripted run emit notifications the way a real host would.
pub struct Notifier {
    hub: Arc<EventHub>,
    host_id: String,
}

impl Notifier {
    pub fn notify(&self, widget_ref: &str, status: Status, message: &str) {
        self.hub.publish(
            WIDGET_UPDATE_TOPIC,
            StatusUpdate {
                widget_ref: widget_ref.to_string(),
                status: Some(status),
                message: Some(message.to_string()),
                result: JsonValue::Null,
                host_id: self.host_id.clone(),
            },
        );
    }
}

type WidgetFn = Box<dyn Fn(&WidgetRequest) -> Option<Envelope> + Send + Sync>;
type RunFn = Box<dyn Fn(&JsonValue, &Notifier) -> Envelope + Send + Sync>;
type ContextFn = Box<dyn Fn(&str, &str) -> Result<String, HostError> + Send + Sync>;

pub struct ScriptedHost {
    id: String,
    host_definitions: Vec<String>,
    hub: Arc<EventHub>,
    widget_fn: WidgetFn,
    run_fn: RunFn,
    context_fn: ContextFn,
    pub widget_requests: Mutex<Vec<WidgetRequest>>,
    pub runs: Mutex<Vec<JsonValue>>,
    pub run_calls: AtomicUsize,
}

impl ScriptedHost {
    /// Answers every widget request with an empty options object and every
    /// run with success.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            host_definitions: vec!["python".to_string()],
            hub: EventHub::new(),
            widget_fn: Box::new(|_| Some(Envelope::success(json!({})))),
            run_fn: Box::new(|_, _| Envelope::success(JsonValue::Null)),
            context_fn: Box::new(|parent, name| Ok(format!("{parent}/{name}"))),
            widget_requests: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            run_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_hub(mut self, hub: Arc<EventHub>) -> Self {
        self.hub = hub;
        self
    }

    pub fn with_host_definitions(mut self, defs: &[&str]) -> Self {
        self.host_definitions = defs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn on_widget(
        mut self,
        f: impl Fn(&WidgetRequest) -> Option<Envelope> + Send + Sync + 'static,
    ) -> Self {
        self.widget_fn = Box::new(f);
        self
    }

    pub fn on_run(
        mut self,
        f: impl Fn(&JsonValue, &Notifier) -> Envelope + Send + Sync + 'static,
    ) -> Self {
        self.run_fn = Box::new(f);
        self
    }

    pub fn on_context(
        mut self,
        f: impl Fn(&str, &str) -> Result<String, HostError> + Send + Sync + 'static,
    ) -> Self {
        self.context_fn = Box::new(f);
        self
    }

    pub fn run_count(&self) -> usize {
        self.run_calls.load(Ordering::SeqCst)
    }

    pub fn widget_request_log(&self) -> Vec<WidgetRequest> {
        self.widget_requests
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl HostConnection for ScriptedHost {
    fn id(&self) -> &str {
        &self.id
    }

    fn host_definitions(&self) -> &[String] {
        &self.host_definitions
    }

    fn events(&self) -> Arc<EventHub> {
        Arc::clone(&self.hub)
    }

    fn request_widget(&self, req: &WidgetRequest) -> Result<Option<Envelope>, HostError> {
        if let Ok(mut log) = self.widget_requests.lock() {
            log.push(req.clone());
        }
        Ok((self.widget_fn)(req))
    }

    fn run_definition(
        &self,
        definition: &JsonValue,
        _engine_type: &str,
    ) -> Result<Envelope, HostError> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut runs) = self.runs.lock() {
            runs.push(definition.clone());
        }
        let notifier = Notifier {
            hub: Arc::clone(&self.hub),
            host_id: self.id.clone(),
        };
        Ok((self.run_fn)(definition, &notifier))
    }

    fn ensure_context(&self, parent_id: &str, name: &str) -> Result<String, HostError> {
        (self.context_fn)(parent_id, name)
    }
}

fn plugin(name: &str, plugin: &str, kind: &str) -> JsonValue {
    json!({"name": name, "plugin": plugin, "type": kind, "options": {}})
}

fn stage(name: &str, plugins: Vec<JsonValue>) -> JsonValue {
    json!({"name": name, "type": "stage", "plugins": plugins})
}

/// Schema shaped like a publisher definition schema.
pub fn publisher_schema() -> JsonValue {
    let plugin = json!({
        "type": "object",
        "title": "Plugin",
        "properties": {
            "name": {"type": "string"},
            "plugin": {"type": "string"},
            "widget": {"type": "string"},
            "type": {"type": "string"},
            "options": {"type": "object"}
        }
    });
    let stage = json!({
        "type": "object",
        "title": "Stage",
        "properties": {
            "name": {"type": "string"},
            "type": {"type": "string"},
            "enabled": {"type": "boolean"},
            "plugins": {"type": "array", "items": plugin}
        }
    });
    let step = json!({
        "type": "object",
        "title": "Component",
        "order": ["name", "stages"],
        "properties": {
            "type": {"type": "string"},
            "name": {"type": "string"},
            "visible": {"type": "boolean", "default": true},
            "stages": {"type": "array", "items": stage}
        }
    });
    json!({
        "type": "object",
        "title": "Definition",
        "properties": {
            "name": {"type": "string"},
            "type": {"type": "string"},
            "host_type": {"type": "string"},
            "_config": {
                "type": "object",
                "properties": {"engine_type": {"type": "string"}}
            },
            "contexts": {"type": "array", "items": step},
            "components": {"type": "array", "items": step},
            "finalizers": {"type": "array", "items": step}
        }
    })
}

/// Definition with one context, a required `snapshot` and an optional
/// `thumbnail` component, and one finalizer step.
pub fn publisher_definition() -> JsonValue {
    json!({
        "name": "File Publisher",
        "type": "publisher",
        "host_type": "python",
        "_config": {"engine_type": "publisher"},
        "contexts": [{
            "name": "main",
            "type": "context",
            "stages": [stage("context", vec![plugin("context selector", "common_passthrough", "context")])]
        }],
        "components": [
            {
                "name": "snapshot",
                "type": "component",
                "stages": [
                    stage("collector", vec![plugin("collect scene", "scene_collector", "collector")]),
                    {
                        "name": "validator",
                        "type": "stage",
                        "enabled": true,
                        "plugins": [plugin("check scene", "scene_validator", "validator")]
                    },
                    {
                        "name": "output",
                        "type": "stage",
                        "enabled": true,
                        "plugins": [plugin("export scene", "scene_output", "output")]
                    }
                ]
            },
            {
                "name": "thumbnail",
                "type": "component",
                "stages": [stage("collector", vec![plugin("grab frame", "frame_collector", "collector")])]
            }
        ],
        "finalizers": [{
            "name": "main",
            "type": "finalizer",
            "stages": [
                stage("pre_finalizer", vec![plugin("prepare", "common_passthrough", "pre_finalizer")]),
                stage("finalizer", vec![plugin("publish", "asset_publisher", "finalizer")])
            ]
        }]
    })
}

pub fn optional_thumbnail_package() -> JsonValue {
    json!({"components": [
        {"name": "snapshot"},
        {"name": "thumbnail", "optional": true}
    ]})
}
