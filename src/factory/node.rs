use crate::error::SchemaError;
use serde_json::{Map, Value as JsonValue};

/// One schema fragment together with the data it describes and the data of
/// the enclosing fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub schema: JsonValue,
    pub data: Option<JsonValue>,
    pub parent_data: Option<JsonValue>,
}

impl SchemaNode {
    pub fn new(
        name: impl Into<String>,
        schema: JsonValue,
        data: Option<JsonValue>,
        parent_data: Option<JsonValue>,
    ) -> Self {
        Self {
            name: name.into(),
            schema,
            data,
            parent_data,
        }
    }

    pub fn schema_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(|t| t.as_str())
    }

    pub fn title(&self) -> Option<&str> {
        self.schema.get("title").and_then(|t| t.as_str())
    }

    pub fn default_value(&self) -> Option<&JsonValue> {
        self.schema.get("default")
    }

    pub fn has_all_of(&self) -> bool {
        self.schema
            .get("allOf")
            .and_then(|a| a.as_array())
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }

    /// Properties in display order; `None` when the fragment has none.
    pub fn ordered_properties(&self) -> Option<Vec<(String, JsonValue)>> {
        let props = self.schema.get("properties")?.as_object()?;
        if props.is_empty() {
            return None;
        }
        let order: Vec<&str> = self
            .schema
            .get("order")
            .and_then(|o| o.as_array())
            .map(|a| a.iter().filter_map(|s| s.as_str()).collect())
            .unwrap_or_default();
        Some(order_properties(props, &order))
    }

    /// True when the properties set is exactly `{widget}`.
    pub fn is_plugin_delegate(&self) -> bool {
        self.schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|p| p.len() == 1 && p.contains_key("widget"))
            .unwrap_or(false)
    }

    pub fn declares_widget(&self) -> bool {
        self.schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|p| p.contains_key("widget"))
            .unwrap_or(false)
    }

    /// Role name used to correlate plugin widgets: the enclosing data's `name`.
    pub fn role_name(&self) -> Option<&str> {
        self.parent_data
            .as_ref()
            .and_then(|d| d.get("name"))
            .and_then(|n| n.as_str())
    }

    pub fn data_object(&self) -> Option<&Map<String, JsonValue>> {
        self.data.as_ref().and_then(|d| d.as_object())
    }

    /// Node for property `key`; this node's data becomes the child's parent data.
    pub fn property(&self, key: &str, schema: JsonValue) -> SchemaNode {
        let data = self
            .data
            .as_ref()
            .and_then(|d| d.get(key))
            .cloned();
        SchemaNode::new(key, schema, data, self.data.clone())
    }

    /// Elements of an array node, each paired with the name it is built under.
    pub fn elements(&self) -> Vec<(String, JsonValue)> {
        let Some(items) = self.data.as_ref().and_then(|d| d.as_array()) else {
            return vec![];
        };
        items
            .iter()
            .map(|item| {
                let name = match item {
                    JsonValue::Object(o) => o
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name, item.clone())
            })
            .collect()
    }

    pub fn has_items_schema(&self) -> bool {
        self.schema.get("items").map(|i| i.is_object()).unwrap_or(false)
    }

    /// Schema for array element `index`. A `oneOf` list is consumed
    /// positionally; otherwise every element shares `items`.
    pub fn element_schema(&self, index: usize) -> Result<JsonValue, SchemaError> {
        let items = self.schema.get("items").cloned().unwrap_or(JsonValue::Null);
        match items.get("oneOf").and_then(|o| o.as_array()) {
            Some(one_of) => one_of
                .get(index)
                .cloned()
                .ok_or_else(|| SchemaError::OneOfExhausted {
                    name: self.name.clone(),
                    index,
                    available: one_of.len(),
                }),
            None => Ok(items),
        }
    }

    /// Elements keep the array's parent data, not the array itself.
    pub fn element(&self, name: String, schema: JsonValue, data: JsonValue) -> SchemaNode {
        SchemaNode::new(name, schema, Some(data), self.parent_data.clone())
    }
}

/// Listed names first, by their index in `order`; the rest keep their
/// original relative order after them.
pub fn order_properties(props: &Map<String, JsonValue>, order: &[&str]) -> Vec<(String, JsonValue)> {
    let mut entries: Vec<(usize, String, JsonValue)> = props
        .iter()
        .map(|(k, v)| {
            let rank = order
                .iter()
                .position(|o| *o == k.as_str())
                .unwrap_or(order.len());
            (rank, k.clone(), v.clone())
        })
        .collect();
    entries.sort_by_key(|(rank, _, _)| *rank);
    entries.into_iter().map(|(_, k, v)| (k, v)).collect()
}

/// Deep merge `source` into `dest`: objects recurse, anything else overwrites.
pub fn merge(source: &JsonValue, dest: &mut JsonValue) {
    match (source, dest) {
        (JsonValue::Object(src), JsonValue::Object(dst)) => {
            for (k, v) in src {
                if v.is_object() {
                    let node = dst
                        .entry(k.clone())
                        .or_insert_with(|| JsonValue::Object(Map::new()));
                    if !node.is_object() {
                        *node = JsonValue::Object(Map::new());
                    }
                    merge(v, node);
                } else {
                    dst.insert(k.clone(), v.clone());
                }
            }
        }
        (src, dst) => *dst = src.clone(),
    }
}

/// Collapse `allOf` members and the sibling keys into one fragment.
pub fn resolve_all_of(schema: &JsonValue) -> JsonValue {
    let mut out = JsonValue::Object(Map::new());
    if let Some(members) = schema.get("allOf").and_then(|a| a.as_array()) {
        for m in members {
            merge(m, &mut out);
        }
    }
    if let Some(obj) = schema.as_object() {
        let mut siblings = obj.clone();
        siblings.remove("allOf");
        merge(&JsonValue::Object(siblings), &mut out);
    }
    out
}
