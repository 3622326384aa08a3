//! Manifest generation for discovery and per-tool introspection.

use serde_json::{json, Map, Value};

use crate::registry::{PromptRegistry, ResourceRegistry, ToolRegistry};
use crate::traits::{ExecMode, Prompt, Resource, Tool};

/// The full discovery manifest (`--discover`).
pub fn discover(
    name: &str,
    version: &str,
    tools: &ToolRegistry,
    resources: &ResourceRegistry,
    prompts: &PromptRegistry,
) -> Value {
    json!({
        "name": name,
        "version": version,
        "tools": tools.iter().map(|t| discover_tool_entry(t.as_ref())).collect::<Vec<_>>(),
        "resources": resources.iter().map(|r| resource_manifest(r.as_ref())).collect::<Vec<_>>(),
        "prompts": prompts.iter().map(|p| prompt_manifest(p.as_ref())).collect::<Vec<_>>(),
    })
}

fn discover_tool_entry(tool: &dyn Tool) -> Value {
    json!({
        "name": tool.name(),
        "summary": tool.meta().summary,
        "streaming": tool.mode() == ExecMode::Streaming,
        "session_mode": tool.mode() == ExecMode::Session,
    })
}

/// The tools-only listing (`--tools`).
pub fn tools_listing(tools: &ToolRegistry) -> Value {
    let entries: Vec<Value> = tools
        .iter()
        .map(|t| json!({"name": t.name(), "summary": t.meta().summary}))
        .collect();
    json!({"tools": entries})
}

/// The resources-only listing (`--resources`).
pub fn resources_listing(resources: &ResourceRegistry) -> Value {
    let entries: Vec<Value> = resources
        .iter()
        .map(|r| resource_manifest(r.as_ref()))
        .collect();
    json!({"resources": entries})
}

/// The prompts-only listing (`--prompts`).
pub fn prompts_listing(prompts: &PromptRegistry) -> Value {
    let entries: Vec<Value> = prompts.iter().map(|p| prompt_manifest(p.as_ref())).collect();
    json!({"prompts": entries})
}

/// The schema object for a tool: the input model's JSON Schema when one is
/// declared, else the declared parameter schema.
pub fn tool_schema_json(tool: &dyn Tool) -> Value {
    match tool.input_model() {
        Some(spec) => spec.json_schema(),
        None => tool.schema().to_json_schema(),
    }
}

/// The full per-tool manifest (`<tool> --manifest`).
pub fn tool_manifest(tool: &dyn Tool) -> Value {
    let meta = tool.meta();
    let mut manifest = Map::new();
    manifest.insert("name".into(), json!(tool.name()));
    manifest.insert("summary".into(), json!(meta.summary));
    manifest.insert("description".into(), json!(meta.description));
    manifest.insert(
        "streaming".into(),
        json!(tool.mode() == ExecMode::Streaming),
    );
    manifest.insert(
        "session_mode".into(),
        json!(tool.mode() == ExecMode::Session),
    );
    manifest.insert("schema".into(), tool_schema_json(tool));
    if !meta.examples.is_empty() {
        let examples: Vec<Value> = meta
            .examples
            .iter()
            .map(|e| json!({"description": e.description, "code": e.code}))
            .collect();
        manifest.insert("examples".into(), Value::Array(examples));
    }
    if !meta.tags.is_empty() {
        manifest.insert("tags".into(), json!(meta.tags));
    }
    Value::Object(manifest)
}

/// A resource's manifest entry.
pub fn resource_manifest(resource: &dyn Resource) -> Value {
    json!({
        "uri_pattern": resource.uri_pattern(),
        "summary": resource.summary(),
        "mime_types": resource.mime_types(),
        "tags": resource.tags(),
    })
}

/// A prompt's manifest entry.
pub fn prompt_manifest(prompt: &dyn Prompt) -> Value {
    let mut arguments = Map::new();
    for (name, description) in prompt.arguments() {
        arguments.insert(name, Value::String(description));
    }
    json!({
        "name": prompt.name(),
        "summary": prompt.summary(),
        "arguments": arguments,
        "tags": prompt.tags(),
    })
}
