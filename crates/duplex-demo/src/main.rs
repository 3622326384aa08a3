//! duplex-demo: a demo executable speaking the duplex protocol.
//!
//! # Usage
//!
//! ```bash
//! # Discovery and help
//! duplex-demo --discover
//! duplex-demo add --manifest
//!
//! # Same tool, both dialects
//! duplex-demo add '{"a": 5, "b": 3}'
//! duplex-demo add --a 5 --b 3
//!
//! # Streaming and session modes
//! duplex-demo process --stream --items 5
//! duplex-demo chat --session
//!
//! # Resources and prompts
//! duplex-demo --resource 'config://server/port'
//! duplex-demo --prompt greet '{"name": "Ada"}'
//! ```

mod tools;

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use duplex_core::AgentCli;

use crate::tools::{
    Add, Chat, ConfigResource, Deploy, Divide, FileResource, GreetPrompt, Process, Summarize,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics stay silent unless RUST_LOG asks for them; the secondary
    // channel belongs to notification events.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = AgentCli::new("duplex-demo", env!("CARGO_PKG_VERSION"))
        .tool(Arc::new(Add))
        .tool(Arc::new(Divide))
        .tool(Arc::new(Deploy))
        .tool(Arc::new(Summarize))
        .tool(Arc::new(Process))
        .tool(Arc::new(Chat))
        .resource(Arc::new(ConfigResource))
        .resource(Arc::new(FileResource))
        .prompt(Arc::new(GreetPrompt));

    cli.run().await?;
    Ok(())
}
