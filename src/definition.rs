//! Read-only helpers over a pipeline definition document.
//!
//! A definition groups its steps under `contexts`, `components` and
//! `finalizers`; each step holds `stages`, each stage holds `plugins`.

use serde_json::Value as JsonValue;

pub const STEP_GROUPS: [&str; 3] = ["contexts", "components", "finalizers"];
pub const FINALIZER: &str = "finalizer";

/// A progress row derived from the definition, keyed by `(step_type, label)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressStep {
    pub step_type: String,
    pub label: String,
}

fn is_visible(v: &JsonValue) -> bool {
    v.get("visible").and_then(|b| b.as_bool()).unwrap_or(true)
}

fn str_field<'a>(v: &'a JsonValue, key: &str) -> &'a str {
    v.get(key).and_then(|s| s.as_str()).unwrap_or("")
}

fn array_field<'a>(v: &'a JsonValue, key: &str) -> &'a [JsonValue] {
    v.get(key)
        .and_then(|a| a.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// All steps in definition order (contexts, components, finalizers).
pub fn steps(def: &JsonValue) -> impl Iterator<Item = &JsonValue> {
    STEP_GROUPS
        .iter()
        .flat_map(move |group| array_field(def, group).iter())
}

pub fn engine_type(def: &JsonValue) -> Option<String> {
    def.get("_config")
        .and_then(|c| c.get("engine_type"))
        .and_then(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Progress rows for one run of `def`: a row per visible non-finalizer step,
/// and a row per visible stage of each finalizer step.
pub fn progress_steps(def: &JsonValue) -> Vec<ProgressStep> {
    let mut out = Vec::new();
    for step in steps(def) {
        let step_type = str_field(step, "type");
        if step_type != FINALIZER {
            if is_visible(step) {
                out.push(ProgressStep {
                    step_type: step_type.to_string(),
                    label: str_field(step, "name").to_string(),
                });
            }
        } else {
            for stage in array_field(step, "stages") {
                if is_visible(stage) {
                    out.push(ProgressStep {
                        step_type: step_type.to_string(),
                        label: str_field(stage, "name").to_string(),
                    });
                }
            }
        }
    }
    out
}

/// Find the progress row a bound plugin reports into.
pub fn locate_plugin(def: &JsonValue, widget_ref: &str) -> Option<ProgressStep> {
    for step in steps(def) {
        let step_type = str_field(step, "type");
        for stage in array_field(step, "stages") {
            let hit = array_field(stage, "plugins")
                .iter()
                .any(|p| str_field(p, "widget_ref") == widget_ref);
            if hit {
                let label = if step_type == FINALIZER {
                    str_field(stage, "name")
                } else {
                    str_field(step, "name")
                };
                return Some(ProgressStep {
                    step_type: step_type.to_string(),
                    label: label.to_string(),
                });
            }
        }
    }
    None
}

/// Write `context_id` into the options of every plugin of every context step.
/// Returns how many plugins were touched.
pub fn set_context_option(def: &mut JsonValue, context_id: &str) -> usize {
    let mut touched = 0;
    let Some(contexts) = def.get_mut("contexts").and_then(|c| c.as_array_mut()) else {
        return 0;
    };
    for step in contexts.iter_mut() {
        let Some(stages) = step.get_mut("stages").and_then(|s| s.as_array_mut()) else {
            continue;
        };
        for stage in stages.iter_mut() {
            let Some(plugins) = stage.get_mut("plugins").and_then(|p| p.as_array_mut()) else {
                continue;
            };
            for plugin in plugins.iter_mut() {
                let Some(obj) = plugin.as_object_mut() else {
                    continue;
                };
                let options = obj
                    .entry("options")
                    .or_insert_with(|| JsonValue::Object(Default::default()));
                if !options.is_object() {
                    *options = JsonValue::Object(Default::default());
                }
                if let Some(o) = options.as_object_mut() {
                    o.insert(
                        "context_id".to_string(),
                        JsonValue::String(context_id.to_string()),
                    );
                    touched += 1;
                }
            }
        }
    }
    touched
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> JsonValue {
        json!({
            "name": "File Publisher",
            "_config": {"engine_type": "publisher"},
            "contexts": [{
                "name": "main", "type": "context",
                "stages": [{"name": "context", "plugins": [
                    {"name": "ctx", "plugin": "context_selector"}
                ]}]
            }],
            "components": [
                {"name": "snapshot", "type": "component", "stages": [
                    {"name": "collector", "plugins": [{"name": "c", "widget_ref": "abc"}]}
                ]},
                {"name": "hidden", "type": "component", "visible": false, "stages": []}
            ],
            "finalizers": [{
                "name": "main", "type": "finalizer",
                "stages": [
                    {"name": "pre_finalizer", "visible": false, "plugins": []},
                    {"name": "finalizer", "plugins": [{"name": "f", "widget_ref": "fin"}]}
                ]
            }]
        })
    }

    #[test]
    fn progress_rows_expand_finalizer_stages() {
        let rows = progress_steps(&sample());
        let labels: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.step_type.as_str(), r.label.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("context", "main"),
                ("component", "snapshot"),
                ("finalizer", "finalizer")
            ]
        );
    }

    #[test]
    fn locate_plugin_maps_to_progress_row() {
        let def = sample();
        assert_eq!(
            locate_plugin(&def, "abc"),
            Some(ProgressStep {
                step_type: "component".into(),
                label: "snapshot".into()
            })
        );
        assert_eq!(locate_plugin(&def, "fin").map(|s| s.label), Some("finalizer".into()));
        assert!(locate_plugin(&def, "nope").is_none());
    }

    #[test]
    fn context_id_is_injected_into_context_plugins() {
        let mut def = sample();
        assert_eq!(set_context_option(&mut def, "ctx-42"), 1);
        assert_eq!(
            def["contexts"][0]["stages"][0]["plugins"][0]["options"]["context_id"],
            json!("ctx-42")
        );
        assert_eq!(engine_type(&def).as_deref(), Some("publisher"));
    }
}
