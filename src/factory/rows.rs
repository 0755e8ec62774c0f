use crate::factory::options::PluginOptionsHost;
use crate::factory::widget::{SchemaWidget, WidgetKind, WidgetRef};
use crate::factory::WidgetFactory;
use crate::model::Status;

/// What editing a row acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum RowTarget {
    None,
    Leaf(Vec<usize>),
    Toggle(Vec<usize>),
    PluginOption { widget_ref: WidgetRef, key: String },
}

/// One line of the flattened form.
#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub depth: usize,
    pub label: String,
    pub value: Option<String>,
    pub placeholder: Option<String>,
    pub checked: Option<bool>,
    pub error: Option<String>,
    pub status: Option<Status>,
    pub target: RowTarget,
}

impl FormRow {
    pub fn is_editable(&self) -> bool {
        !matches!(self.target, RowTarget::None)
    }
}

/// Flatten the factory's tree for display. Hidden widgets are skipped;
/// transparent `allOf` wrappers do not add a level.
pub fn collect_rows(factory: &WidgetFactory) -> Vec<FormRow> {
    let mut rows = Vec::new();
    if let Some(root) = factory.root() {
        let mut path = Vec::new();
        walk(factory, root, 0, &mut path, &mut rows);
    }
    rows
}

fn walk(
    factory: &WidgetFactory,
    w: &dyn SchemaWidget,
    depth: usize,
    path: &mut Vec<usize>,
    rows: &mut Vec<FormRow>,
) {
    if w.is_hidden() {
        return;
    }
    if w.kind() == WidgetKind::AllOf {
        if let Some(inner) = w.child(0) {
            path.push(0);
            walk(factory, inner, depth, path, rows);
            path.pop();
        }
        return;
    }

    let target = if w.checked().is_some() {
        RowTarget::Toggle(path.clone())
    } else if w.display_value().is_some() {
        RowTarget::Leaf(path.clone())
    } else {
        RowTarget::None
    };
    let mut row = FormRow {
        depth,
        label: w.name().to_string(),
        value: w.display_value(),
        placeholder: w.placeholder(),
        checked: w.checked(),
        error: w.error_text(),
        status: None,
        target,
    };

    if let Some(host) = w.as_any().downcast_ref::<PluginOptionsHost>() {
        let options = factory.plugin_widgets().get(host.widget_ref());
        if let Some(ow) = options {
            row.status = ow.status;
            row.value = ow.message.clone();
        }
        rows.push(row);
        if let Some(ow) = options {
            for (key, value) in &ow.options {
                rows.push(FormRow {
                    depth: depth + 1,
                    label: key.clone(),
                    value: Some(match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    }),
                    placeholder: None,
                    checked: None,
                    error: None,
                    status: None,
                    target: RowTarget::PluginOption {
                        widget_ref: host.widget_ref().clone(),
                        key: key.clone(),
                    },
                });
            }
        }
        return;
    }

    rows.push(row);
    for i in 0..w.child_count() {
        if let Some(child) = w.child(i) {
            path.push(i);
            walk(factory, child, depth + 1, path, rows);
            path.pop();
        }
    }
}
