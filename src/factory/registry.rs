use crate::error::PluginResolutionError;
use crate::factory::hidden::Hidden;
use crate::factory::leaf::{JsonBoolean, JsonInteger, JsonNumber, JsonString};
use crate::factory::node::SchemaNode;
use crate::factory::object::{AllOfObject, JsonObject};
use crate::factory::overrides::{build_components, build_stages};
use crate::factory::unsupported::SchemaErrorWidget;
use crate::factory::widget::SchemaWidget;
use crate::factory::array::JsonArray;
use crate::factory::WidgetFactory;
use std::collections::HashMap;

pub type BuildResult = Result<Box<dyn SchemaWidget>, PluginResolutionError>;
pub type WidgetConstructor = fn(&mut WidgetFactory, SchemaNode) -> BuildResult;
pub type ResolverFn = Box<dyn Fn(&SchemaNode) -> Option<WidgetConstructor> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Name,
    Title,
}

/// One lookup strategy; the registry asks each in turn.
pub enum Resolver {
    Name(HashMap<String, WidgetConstructor>),
    Title(HashMap<String, WidgetConstructor>),
    Type(HashMap<String, WidgetConstructor>),
    Custom(ResolverFn),
}

impl Resolver {
    pub fn resolve(&self, node: &SchemaNode) -> Option<WidgetConstructor> {
        match self {
            Resolver::Name(m) => m.get(node.name.as_str()).copied(),
            Resolver::Title(m) => node.title().and_then(|t| m.get(t).copied()),
            Resolver::Type(m) => node.schema_type().and_then(|t| m.get(t).copied()),
            Resolver::Custom(f) => f(node),
        }
    }

    fn table_mut(&mut self, category: Category) -> Option<&mut HashMap<String, WidgetConstructor>> {
        match (self, category) {
            (Resolver::Name(m), Category::Name)
            | (Resolver::Title(m), Category::Title) => Some(m),
            _ => None,
        }
    }
}

/// Ordered resolver list ending in a fallback constructor. Each factory gets
/// its own instance.
pub struct OverrideRegistry {
    resolvers: Vec<Resolver>,
    fallback: WidgetConstructor,
}

impl OverrideRegistry {
    pub fn new(fallback: WidgetConstructor) -> Self {
        Self {
            resolvers: Vec::new(),
            fallback,
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Name, then `allOf`, then title, then type; unsupported last.
    pub fn standard() -> Self {
        let mut types: HashMap<String, WidgetConstructor> = HashMap::new();
        types.insert("object".into(), JsonObject::build);
        types.insert("string".into(), JsonString::build);
        types.insert("integer".into(), JsonInteger::build);
        types.insert("array".into(), JsonArray::build);
        types.insert("number".into(), JsonNumber::build);
        types.insert("boolean".into(), JsonBoolean::build);
        Self::new(SchemaErrorWidget::unsupported)
            .with_resolver(Resolver::Name(HashMap::new()))
            .with_resolver(Resolver::Custom(Box::new(|node| {
                node.has_all_of()
                    .then_some(AllOfObject::build as WidgetConstructor)
            })))
            .with_resolver(Resolver::Title(HashMap::new()))
            .with_resolver(Resolver::Type(types))
    }

    /// Overrides used for publisher definitions.
    pub fn publisher_defaults() -> Self {
        let mut reg = Self::standard();
        reg.register(Category::Name, "components", build_components);
        reg.register(Category::Name, "stages", build_stages);
        for hidden in ["_config", "ui", "type", "name", "package", "host", "enabled"] {
            reg.register(Category::Name, hidden, Hidden::build);
        }
        reg.register(Category::Title, "Plugin", JsonObject::build_plugin_container);
        reg.register(Category::Title, "Component", JsonObject::build_plugin_container);
        reg
    }

    /// Add to the first table of `category`, appending one if missing.
    pub fn register(&mut self, category: Category, key: &str, ctor: WidgetConstructor) {
        for r in self.resolvers.iter_mut() {
            if let Some(table) = r.table_mut(category) {
                table.insert(key.to_string(), ctor);
                return;
            }
        }
        let mut table = HashMap::new();
        table.insert(key.to_string(), ctor);
        self.resolvers.push(match category {
            Category::Name => Resolver::Name(table),
            Category::Title => Resolver::Title(table),
        });
    }

    pub fn resolve(&self, node: &SchemaNode) -> WidgetConstructor {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve(node))
            .unwrap_or(self.fallback)
    }
}

impl Default for OverrideRegistry {
    fn default() -> Self {
        Self::publisher_defaults()
    }
}
