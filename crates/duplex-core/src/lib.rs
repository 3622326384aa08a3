//! duplex-core: the dual-protocol command dispatcher.
//!
//! One registration, two dialects. A tool registered with [`AgentCli`] can
//! be invoked by a human with flags (`mytool add --a 5 --b 3`) or by an
//! agent with a JSON envelope (`mytool add '{"a": 5, "b": 3}'`), and always
//! answers with structured JSON on the primary channel.
//!
//! # Architecture
//!
//! ```text
//! AgentCli (dispatcher)
//! ├── ToolRegistry ──▶ Tool (Direct | Streaming | Session)
//! │                      ├── direct: envelope on stdout
//! │                      ├── streaming driver: event lines  (--stream)
//! │                      └── session driver: alternating exchange (--session)
//! ├── ResourceRegistry ──▶ URI router ──▶ Resource
//! ├── PromptRegistry ──▶ Prompt
//! ├── sampling channel (stdin-correlated or HTTP callback)
//! └── notification channel (stderr, fire-and-forget)
//! ```

mod cli;
mod context;
mod manifest;
mod notify;
mod registry;
mod router;
mod sample;
mod session;
mod stream;
mod task;
mod traits;

pub use cli::AgentCli;
pub use context::{BufferHandle, InputChannel, OutputChannel, ToolContext};
pub use manifest::{discover, tool_manifest, tool_schema_json};
pub use notify::Notifier;
pub use registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
pub use router::{capture_params, compile_pattern};
pub use sample::{SampleRequest, SamplingConfig};
pub use session::{run_session, SessionPeer};
pub use stream::{run_streaming, EventSink};
pub use traits::{ExecMode, Prompt, Resource, Tool};

// Re-export the shared protocol types so depending on duplex-core alone is
// enough to write a tool.
pub use duplex_types::{
    BoundInput, ErrorBody, ErrorCode, Example, InputSpec, ModelSpec, ParamSchema, Response,
    SessionEvent, Status, StreamEvent, ToolError, ToolInput, ToolMeta, ToolParams, ToolSchema,
};
