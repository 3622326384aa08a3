//! Core tool, resource, and prompt traits.
//!
//! Registration is "wrap and register": implement the trait, hand an `Arc`
//! to the registry. Metadata lives on the trait so the manifest, the help
//! text, and the dispatcher all read the same declaration.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use duplex_types::{InputSpec, ToolError, ToolMeta, ToolParams, ToolSchema};

use crate::context::ToolContext;
use crate::session::SessionPeer;
use crate::stream::EventSink;

/// How a tool exchanges data with its caller.
///
/// Declared, not inferred: the dispatcher routes on this and discovery
/// reports it, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// One request, one response envelope.
    #[default]
    Direct,
    /// One-way event stream, requires `--stream`.
    Streaming,
    /// Bidirectional alternating exchange, requires `--session`.
    Session,
}

/// A registered command.
///
/// Implement the invocation method matching the declared [`ExecMode`]; the
/// defaults fail with `INTERNAL` so a mismatched declaration is loud.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's name (used for lookup).
    fn name(&self) -> &str;

    /// Declarative metadata for listings and manifests.
    fn meta(&self) -> ToolMeta;

    /// The tool's parameter schema.
    fn schema(&self) -> ToolSchema;

    /// Typed input model, if the tool declares one.
    fn input_model(&self) -> Option<Arc<dyn InputSpec>> {
        None
    }

    /// Declared execution mode.
    fn mode(&self) -> ExecMode {
        ExecMode::Direct
    }

    /// Direct invocation: return a value the dispatcher envelopes.
    async fn call(&self, params: ToolParams, ctx: &ToolContext) -> Result<Value, ToolError> {
        let _ = (params, ctx);
        Err(ToolError::internal(format!(
            "{} does not support direct calls",
            self.name()
        )))
    }

    /// Streaming invocation: push events into the sink until done.
    async fn produce(
        &self,
        params: ToolParams,
        events: EventSink,
        ctx: &ToolContext,
    ) -> Result<(), ToolError> {
        let _ = (params, events, ctx);
        Err(ToolError::internal(format!(
            "{} does not support streaming",
            self.name()
        )))
    }

    /// Session invocation: alternate events and inputs over the peer.
    async fn converse(
        &self,
        params: ToolParams,
        peer: SessionPeer,
        ctx: &ToolContext,
    ) -> Result<(), ToolError> {
        let _ = (params, peer, ctx);
        Err(ToolError::internal(format!(
            "{} does not support sessions",
            self.name()
        )))
    }
}

/// A URI-addressed resource provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// URI pattern with `{placeholder}` segments.
    fn uri_pattern(&self) -> &str;

    /// One-line summary for listings.
    fn summary(&self) -> &str;

    /// MIME types this resource may return.
    fn mime_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Free-form tags.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Fetch the resource; `params` holds the captured placeholder values.
    async fn fetch(
        &self,
        params: HashMap<String, String>,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError>;
}

/// A named prompt template.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Prompt name (used for lookup).
    fn name(&self) -> &str;

    /// One-line summary for listings.
    fn summary(&self) -> &str;

    /// Argument name/description pairs, in declaration order.
    fn arguments(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Free-form tags.
    fn tags(&self) -> Vec<String> {
        Vec::new()
    }

    /// Render the prompt with the given arguments.
    async fn render(&self, args: Map<String, Value>, ctx: &ToolContext)
        -> Result<Value, ToolError>;
}
