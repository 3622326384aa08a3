//! Typed tool input: validation, reserved-field capabilities, binding.
//!
//! A tool may declare an input model — a deserializable type implementing
//! [`ToolInput`]. The dispatcher binds raw parameters through the model's
//! [`InputSpec`], then interrogates the resulting [`BoundInput`] for the
//! reserved-field capabilities (`working_dir`, `timeout`, `dry_run`) through
//! the trait, never through reflection.

use std::any::Any;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorCode, ToolError};

/// Capabilities of a typed tool input.
///
/// Every method has a default; a model opts into a reserved field by
/// overriding the matching method.
pub trait ToolInput: Send + Sync {
    /// Validation requiring I/O, run after deserialization and before any
    /// reserved-field handling.
    fn pre_validate(&self) -> Result<(), ToolError> {
        Ok(())
    }

    /// Directory to switch the process into before invocation.
    fn working_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Deadline in seconds for the invocation.
    fn timeout(&self) -> Option<i64> {
        None
    }

    /// When true, report what would run instead of running it.
    fn dry_run(&self) -> bool {
        false
    }

    /// Redacted parameter view for dry-run reporting. `None` means "use the
    /// full serialized form"; override to hide sensitive fields.
    fn log_safe(&self) -> Option<Value> {
        None
    }
}

/// A validated input object, type-erased for the dispatcher.
pub trait BoundInput: Send + Sync {
    fn pre_validate(&self) -> Result<(), ToolError>;
    fn working_dir(&self) -> Option<PathBuf>;
    fn timeout(&self) -> Option<i64>;
    fn dry_run(&self) -> bool;
    /// The dry-run projection: the model's own redaction, falling back to
    /// its serialized form — never the raw input data.
    fn log_safe(&self) -> Value;
    fn as_any(&self) -> &dyn Any;
}

impl std::fmt::Debug for dyn BoundInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.log_safe())
    }
}

struct Bound<T>(T);

impl<T> BoundInput for Bound<T>
where
    T: ToolInput + Serialize + 'static,
{
    fn pre_validate(&self) -> Result<(), ToolError> {
        self.0.pre_validate()
    }

    fn working_dir(&self) -> Option<PathBuf> {
        self.0.working_dir()
    }

    fn timeout(&self) -> Option<i64> {
        self.0.timeout()
    }

    fn dry_run(&self) -> bool {
        self.0.dry_run()
    }

    fn log_safe(&self) -> Value {
        self.0
            .log_safe()
            .unwrap_or_else(|| serde_json::to_value(&self.0).unwrap_or(Value::Null))
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }
}

/// The input-model capability: produce a schema, bind raw data.
///
/// Schema generation and validation are consumed, not implemented: the
/// schema comes from `schemars`, validation from `serde` deserialization.
pub trait InputSpec: Send + Sync {
    /// JSON Schema projection of the model (`{properties, required, ...}`).
    fn json_schema(&self) -> Value;

    /// Deserialize and validate raw parameters into a bound input.
    fn bind(&self, raw: Value) -> Result<Arc<dyn BoundInput>, ToolError>;
}

/// [`InputSpec`] implementation for a concrete model type.
pub struct ModelSpec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ModelSpec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ModelSpec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InputSpec for ModelSpec<T>
where
    T: ToolInput + Serialize + DeserializeOwned + JsonSchema + 'static,
{
    fn json_schema(&self) -> Value {
        let schema = schemars::gen::SchemaGenerator::default().into_root_schema_for::<T>();
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }

    fn bind(&self, raw: Value) -> Result<Arc<dyn BoundInput>, ToolError> {
        let typed: T = serde_json::from_value(raw)
            .map_err(|e| ToolError::new(ErrorCode::InvalidInput, e.to_string()))?;
        Ok(Arc::new(Bound(typed)))
    }
}

/// Parameters handed to a tool: either the raw mapping or a bound model.
#[derive(Clone)]
pub enum ToolParams {
    /// Raw key/value parameters (no input model declared).
    Raw(Map<String, Value>),
    /// A validated input model instance.
    Model(Arc<dyn BoundInput>),
}

impl ToolParams {
    /// Empty raw parameters.
    pub fn empty() -> Self {
        Self::Raw(Map::new())
    }

    /// The raw mapping, if no model was bound.
    pub fn raw(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Raw(map) => Some(map),
            Self::Model(_) => None,
        }
    }

    /// The bound input's capability interface, if a model was bound.
    pub fn bound(&self) -> Option<&dyn BoundInput> {
        match self {
            Self::Raw(_) => None,
            Self::Model(input) => Some(input.as_ref()),
        }
    }

    /// Downcast the bound model to its concrete type.
    pub fn model<T: 'static>(&self) -> Option<&T> {
        self.bound().and_then(|b| b.as_any().downcast_ref::<T>())
    }
}

impl std::fmt::Debug for ToolParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw(map) => f.debug_tuple("Raw").field(map).finish(),
            Self::Model(_) => f.write_str("Model(..)"),
        }
    }
}
