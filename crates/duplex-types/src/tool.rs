//! Tool schema and metadata records.

use serde_json::{json, Map, Value};

/// Declared schema for one tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    /// Parameter name, as it appears in flags and JSON keys.
    pub name: String,
    /// Type hint (string, integer, number, boolean, array, object).
    pub param_type: String,
    /// Whether callers must supply this parameter.
    pub required: bool,
    /// Default applied when an optional parameter is omitted.
    pub default: Option<Value>,
    /// Description for help text and manifests.
    pub description: String,
}

impl ParamSchema {
    /// Create a required parameter.
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: true,
            default: None,
            description: description.into(),
        }
    }

    /// Create an optional parameter with a default value.
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required: false,
            default: Some(default),
            description: description.into(),
        }
    }
}

/// A worked usage example attached to a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    /// What the example demonstrates.
    pub description: String,
    /// The example command line.
    pub code: String,
}

impl Example {
    pub fn new(description: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            code: code.into(),
        }
    }
}

/// Schema describing a tool's parameters.
///
/// Tools without a typed input model declare their surface here; the
/// dispatcher renders it as a JSON Schema for manifests and as aligned text
/// for `--help`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Parameter definitions, in declaration order.
    pub params: Vec<ParamSchema>,
}

impl ToolSchema {
    /// Create a new tool schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to the schema.
    pub fn param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Render as a JSON Schema object (`{type, properties, required}`).
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut prop = Map::new();
            prop.insert("type".into(), Value::String(param.param_type.clone()));
            if !param.description.is_empty() {
                prop.insert("description".into(), Value::String(param.description.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        Value::Object(schema)
    }
}

/// Declarative tool metadata attached at registration.
///
/// The streaming/session flags are not here: they derive from the tool's
/// declared execution mode so discovery can never disagree with dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolMeta {
    /// One-line summary for listings.
    pub summary: String,
    /// Longer description for `--help` and manifests.
    pub description: String,
    /// Usage examples.
    pub examples: Vec<Example>,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl ToolMeta {
    /// Metadata with a summary only.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    /// Add a longer description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a usage example.
    pub fn example(mut self, description: impl Into<String>, code: impl Into<String>) -> Self {
        self.examples.push(Example::new(description, code));
        self
    }

    /// Add a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}
