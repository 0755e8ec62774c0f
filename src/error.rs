use thiserror::Error;

/// Malformed or incomplete schema fragment. Always recovered locally by
/// rendering an inline error widget in place of the offending node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid object description (missing properties)")]
    MissingProperties { name: String },

    #[error("Unsupported schema type '{type_name}' for '{name}'")]
    UnsupportedType { name: String, type_name: String },

    #[error(
        "Array '{name}' element {index} has no positional schema (oneOf describes {available} item(s))"
    )]
    OneOfExhausted {
        name: String,
        index: usize,
        available: usize,
    },
}

/// Transport-level failures talking to the host process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Failed to parse host command line: {0}")]
    CommandLine(String),

    #[error("Host process failed: {0}")]
    Process(String),

    #[error("Invalid host response: {0}")]
    Protocol(String),
}

/// The host answered a widget request with something the factory cannot use.
/// Fatal to the branch being built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginResolutionError {
    #[error(
        "Got response \"{message}\" while fetching widget '{widget_name}' for plugin '{plugin_name}' ({plugin_type})"
    )]
    HostException {
        message: String,
        plugin_name: String,
        plugin_type: String,
        widget_name: String,
    },

    #[error("Widget '{widget_name}' ({plugin_type}) is not a valid options widget: {reason}")]
    Contract {
        widget_name: String,
        plugin_type: String,
        reason: String,
    },

    #[error("No host answered the widget request for '{widget_name}' ({plugin_type})")]
    NoResponse {
        widget_name: String,
        plugin_type: String,
    },

    #[error("Widget factory has no host connection")]
    NoHostConnection,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Raised while preparing one batch item (context synthesis). The item is
/// counted as failed and the batch continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrepareError {
    #[error("Item '{item_id}' has no context_id and no parent_id/name to create one from")]
    MissingContext { item_id: String },

    #[error("Could not create context '{name}' under '{parent_id}': {reason}")]
    ContextSynthesis {
        parent_id: String,
        name: String,
        reason: String,
    },

    #[error("Item '{item_id}' has no definition to run")]
    MissingDefinition { item_id: String },

    #[error("Definition for item '{item_id}' has no engine type")]
    MissingEngine { item_id: String },

    #[error("Could not resolve plugin widgets for item '{item_id}': {reason}")]
    WidgetResolution { item_id: String, reason: String },
}

/// The host reported a failed execution for one batch item.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
    pub traceback: Option<String>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    pub fn with_traceback(mut self, traceback: Option<String>) -> Self {
        self.traceback = traceback;
        self
    }
}

impl From<HostError> for ExecutionError {
    fn from(e: HostError) -> Self {
        ExecutionError::new(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No pipeline-client.yaml found (set PIPELINE_CLIENT_CONFIG_DIR)")]
    NotFound,

    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
