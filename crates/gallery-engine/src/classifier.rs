use gallery_contracts::{CanonicalField, MetadataBag};
use serde_json::{Map, Value};

use crate::decoder::DecodedTag;
use crate::positive::{structured_prompt, truncate_positive_prompt};

/// Merges one decoded tag into the bag if its text is a JSON object that
/// carries a prompt graph or a workflow. Plain text is left alone.
pub fn classify_and_merge(bag: &mut MetadataBag, tag: &DecodedTag) -> Vec<String> {
    let mut trace = Vec::new();
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&tag.text) else {
        return trace;
    };
    let name = tag.slot.name();

    if let Some(prompt) = map.get("prompt") {
        merge(
            bag,
            CanonicalField::Prompt,
            embedded_text(prompt),
            format!("  -> Found 'prompt' key inside {name}"),
            &mut trace,
        );
    }
    if let Some(workflow) = map.get("workflow") {
        merge(
            bag,
            CanonicalField::Workflow,
            embedded_text(workflow),
            format!("  -> Found 'workflow' key inside {name}"),
            &mut trace,
        );
    }
    if tag.slot.is_prompt_likely() && looks_like_node_map(&map) {
        merge(
            bag,
            CanonicalField::Prompt,
            tag.text.clone(),
            format!("  -> Used {name} content as 'prompt'"),
            &mut trace,
        );
    }
    if tag.slot.is_workflow_likely() && map.contains_key("nodes") && map.contains_key("links") {
        merge(
            bag,
            CanonicalField::Workflow,
            tag.text.clone(),
            format!("  -> Used {name} content as 'workflow'"),
            &mut trace,
        );
    }
    trace
}

/// UserComment is read as a prompt, never classified: the Civitai
/// `extraMetadata` prompt first, else the truncated text, JSON or not.
pub fn merge_user_comment(bag: &mut MetadataBag, tag: &DecodedTag) -> Vec<String> {
    let mut trace = Vec::new();
    let text = tag.text.trim();
    if text.is_empty() {
        trace.push("  -> UserComment is empty".to_string());
        return trace;
    }

    if let Some(prompt) = structured_prompt(text) {
        merge(
            bag,
            CanonicalField::UserCommentPrompt,
            prompt,
            "  -> Found prompt in UserComment extraMetadata".to_string(),
            &mut trace,
        );
        return trace;
    }

    let prompt = truncate_positive_prompt(text);
    if prompt.is_empty() {
        trace.push("  -> UserComment has no positive prompt".to_string());
        return trace;
    }
    merge(
        bag,
        CanonicalField::UserCommentPrompt,
        prompt,
        "  -> Used UserComment text as prompt".to_string(),
        &mut trace,
    );
    trace
}

/// Weak structural check: every value is an object with an `inputs` key.
/// An empty object passes.
pub fn looks_like_node_map(map: &Map<String, Value>) -> bool {
    map.values().all(|node| {
        node.as_object()
            .is_some_and(|node| node.contains_key("inputs"))
    })
}

fn embedded_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn merge(
    bag: &mut MetadataBag,
    field: CanonicalField,
    value: String,
    found: String,
    trace: &mut Vec<String>,
) {
    if bag.set_if_absent(field, value) {
        trace.push(found);
    } else {
        trace.push(format!("{found} (ignored, '{}' already set)", field.key()));
    }
}
