//! Prompt framing and reply extraction shared by both backends.

use laddrr_core::CompletionRequest;
use serde_json::Value;

/// System prompt that pins the reply to a single JSON document.
pub fn system_prompt(request: &CompletionRequest) -> String {
    let schema = serde_json::to_string_pretty(&request.output_schema)
        .unwrap_or_else(|_| request.output_schema.to_string());
    format!(
        "You are the `{}` step of an organizational-health assistant.\n\
         Reply with exactly one JSON value that conforms to this JSON Schema:\n\n\
         {schema}\n\n\
         Do not add commentary, markdown, or keys the schema does not declare.",
        request.flow
    )
}

/// Pull the JSON value out of a model reply.
///
/// Accepts a bare document, a fenced ```json block, or a document wrapped in
/// prose. Returns `None` when nothing parses.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str(trimmed) {
        return Some(v);
    }
    if let Some(inner) = fenced(trimmed) {
        if let Ok(v) = serde_json::from_str(inner.trim()) {
            return Some(v);
        }
    }
    let start = trimmed.find(['{', '['])?;
    let close = if trimmed.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn fenced(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let rest = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the first newline.
    let body_start = rest.find('\n')? + 1;
    let body = &rest[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}
