//! Positive-prompt extraction from free text and UserComment payloads.

use serde_json::Value;

/// Labels that end the positive prompt in A1111-style parameter blocks.
pub const STOP_MARKERS: [&str; 10] = [
    "Negative prompt:",
    "Steps:",
    "Sampler:",
    "CFG scale:",
    "Seed:",
    "Size:",
    "Clip skip:",
    "Created Date:",
    "Civitai resources:",
    "Civitai metadata:",
];

/// Text before the earliest stop marker, trimmed. Without a marker the whole
/// text is returned trimmed.
pub fn truncate_positive_prompt(text: &str) -> String {
    let cut = STOP_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..cut].trim().to_string()
}

/// `{"extraMetadata": "{\"prompt\": \"...\"}"}` as written by Civitai.
pub fn structured_prompt(text: &str) -> Option<String> {
    let root: Value = serde_json::from_str(text).ok()?;
    let extra = root.as_object()?.get("extraMetadata")?;
    let nested = match extra {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded).ok()?,
        Value::Object(_) => extra.clone(),
        _ => return None,
    };
    match nested.as_object()?.get("prompt")? {
        Value::String(prompt) if !prompt.is_empty() => Some(prompt.clone()),
        _ => None,
    }
}
