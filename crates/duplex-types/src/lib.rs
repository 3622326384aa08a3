//! duplex-types: shared types for the duplex tool protocol.
//!
//! A duplex executable speaks two dialects with one set of tools: flag-style
//! arguments with human text output, and JSON envelopes with structured
//! output. This crate holds the vocabulary both dialects share:
//!
//! - **Response envelope**: the `{status, ...}` wrapper around every direct
//!   result ([`Response`])
//! - **Error taxonomy**: error kinds with default recoverability
//!   ([`ErrorCode`], [`ToolError`])
//! - **Event vocabulary**: streaming and session wire events
//!   ([`StreamEvent`], [`SessionEvent`])
//! - **Tool schema**: parameter and metadata records for manifests and help
//!   ([`ToolSchema`], [`ToolMeta`])
//! - **Input models**: typed, validated tool input with reserved-field
//!   capabilities ([`ToolInput`], [`InputSpec`])

mod error;
mod event;
mod input;
mod response;
mod tool;

pub use error::{ErrorCode, ToolError};
pub use event::{SessionEvent, StreamEvent};
pub use input::{BoundInput, InputSpec, ModelSpec, ToolInput, ToolParams};
pub use response::{ErrorBody, Response, Status, Summary};
pub use tool::{Example, ParamSchema, ToolMeta, ToolSchema};
