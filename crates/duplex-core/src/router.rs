//! Resource URI routing: pattern compilation and placeholder capture.
//!
//! A pattern like `/users/{u}/files/{f}` compiles to an anchored regex where
//! every literal character matches literally (metacharacters included) and
//! each `{name}` becomes a named capture of one-or-more non-slash
//! characters. Routing scans registered patterns in order; the first full
//! match wins.

use std::collections::HashMap;

use regex::Regex;

use duplex_types::ToolError;

/// Compile a `{placeholder}` pattern into an anchored regex.
pub fn compile_pattern(pattern: &str) -> Result<Regex, ToolError> {
    let mut source = String::with_capacity(pattern.len() + 16);
    source.push('^');

    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        let (literal, tail) = rest.split_at(start);
        source.push_str(&regex::escape(literal));

        // tail starts at '{'; a placeholder is a non-empty word run up to '}'.
        let body = &tail[1..];
        match body.find('}') {
            Some(end) if end > 0 && body[..end].chars().all(|c| c.is_alphanumeric() || c == '_') => {
                source.push_str("(?P<");
                source.push_str(&body[..end]);
                source.push_str(">[^/]+)");
                rest = &body[end + 1..];
            }
            _ => {
                // Not a placeholder: the brace is a literal.
                source.push_str(&regex::escape("{"));
                rest = body;
            }
        }
    }
    source.push_str(&regex::escape(rest));
    source.push('$');

    Regex::new(&source)
        .map_err(|e| ToolError::internal(format!("invalid resource pattern {pattern}: {e}")))
}

/// Match a URI against a compiled pattern, returning the captured
/// placeholder values. `None` when the whole URI does not match.
pub fn capture_params(regex: &Regex, uri: &str) -> Option<HashMap<String, String>> {
    let caps = regex.captures(uri)?;
    let mut params = HashMap::new();
    for name in regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            params.insert(name.to_string(), m.as_str().to_string());
        }
    }
    Some(params)
}
