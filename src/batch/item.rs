use crate::error::PrepareError;
use crate::factory::WidgetFactory;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One entry of the batch list: the opaque item payload plus the form that
/// edits its definition.
pub struct RunItem {
    pub item_id: String,
    pub item: JsonValue,
    pub label: String,
    pub checked: bool,
    pub factory: WidgetFactory,
    source: JsonValue,
    schema: Option<JsonValue>,
    definition: Option<JsonValue>,
}

impl RunItem {
    pub fn new(
        item: JsonValue,
        source: JsonValue,
        schema: Option<JsonValue>,
        factory: WidgetFactory,
    ) -> Self {
        let item_id = Uuid::new_v4().simple().to_string();
        let label = item
            .get("name")
            .or_else(|| item.get("label"))
            .and_then(|n| n.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| item_id[..8].to_string());
        let checked = item.get("checked").and_then(|c| c.as_bool()).unwrap_or(true);
        Self {
            item_id,
            item,
            label,
            checked,
            factory,
            source,
            schema,
            definition: None,
        }
    }

    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// Build the form if there is a schema and it was not built yet.
    pub fn ensure_built(&mut self) -> Result<(), crate::error::PluginResolutionError> {
        let Some(schema) = &self.schema else {
            return Ok(());
        };
        if self.factory.is_built() {
            return Ok(());
        }
        let data = self.definition.as_ref().unwrap_or(&self.source);
        self.factory.build_definition_ui(schema, data)
    }

    /// Keep the edited form state as this item's definition.
    pub fn store_options(&mut self) -> Option<&JsonValue> {
        let out = self.factory.to_json_object()?;
        self.definition = Some(out);
        self.definition.as_ref()
    }

    /// Best current view of the definition without touching the host.
    pub fn current_definition(&self) -> JsonValue {
        self.factory
            .to_json_object()
            .or_else(|| self.definition.clone())
            .unwrap_or_else(|| self.source.clone())
    }

    /// Definition to submit, building the form first when needed.
    pub fn resolve_definition(&mut self) -> Result<JsonValue, PrepareError> {
        self.ensure_built()
            .map_err(|e| PrepareError::WidgetResolution {
                item_id: self.item_id.clone(),
                reason: e.to_string(),
            })?;
        let def = self.current_definition();
        if !def.is_object() {
            return Err(PrepareError::MissingDefinition {
                item_id: self.item_id.clone(),
            });
        }
        Ok(def)
    }
}

/// One item per payload, each with its own factory.
pub fn populate_items(
    items: Vec<JsonValue>,
    source: &JsonValue,
    schema: Option<&JsonValue>,
    mut make_factory: impl FnMut(&JsonValue) -> WidgetFactory,
) -> Vec<RunItem> {
    items
        .into_iter()
        .map(|item| {
            let factory = make_factory(&item);
            RunItem::new(item, source.clone(), schema.cloned(), factory)
        })
        .collect()
}
