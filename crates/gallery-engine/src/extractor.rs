use std::collections::HashSet;
use std::path::Path;

use gallery_contracts::{
    CanonicalField, ExtractionResult, ExtractionTrace, GenerationGraph, MetadataBag,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::classifier::{classify_and_merge, merge_user_comment};
use crate::container::{ContainerError, ContainerMetadata, ContainerReader, FileContainerReader};
use crate::decoder::{decode_tag, DecodedTag, TagSlot};
use crate::positive::truncate_positive_prompt;
use crate::resolver::{resolve, Resolved};

pub const NO_METADATA_MESSAGE: &str = "No standard prompt metadata found.";
pub const WORKFLOW_ONLY_MESSAGE: &str = "Workflow metadata found but no prompt text extracted.";
pub const TEXT_SEPARATOR: &str = "\n---\n";

/// Class-type substrings of nodes that produce prompt text.
const TEXT_NODE_MARKERS: [&str; 3] = ["CLIPTextEncode", "Text", "String"];
/// Inputs tried on each text node, first non-empty wins.
const NODE_TEXT_KEYS: [&str; 3] = ["text", "string", "value"];

const EXTRACTED_PREVIEW_CHARS: usize = 50;
const DUPLICATE_PREVIEW_CHARS: usize = 20;

/// One step of the selection policy: `Some` ends the search.
pub type Strategy = fn(&MetadataBag, &mut ExtractionTrace) -> Option<String>;

/// Selection policy, highest priority first.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("usercomment", from_user_comment),
    ("parameters", from_parameters),
    ("prompt graph", from_prompt_graph),
    ("workflow only", from_workflow_only),
];

/// Stateless prompt extractor. Each call builds its own bag, graph and trace.
pub struct PromptExtractor {
    reader: Box<dyn ContainerReader>,
}

impl Default for PromptExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptExtractor {
    pub fn new() -> Self {
        Self::with_reader(FileContainerReader)
    }

    pub fn with_reader<R: ContainerReader + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Never fails: read errors come back as descriptive text.
    pub fn extract(&self, path: &Path) -> ExtractionResult {
        debug!(path = %path.display(), "extracting prompt");
        let mut trace = ExtractionTrace::new();

        let container = match self.reader.read(path) {
            Ok(container) => container,
            Err(ContainerError::NotFound(missing)) => {
                warn!(path = %missing.display(), "image not found");
                trace.push(format!("Path checked: {}", missing.display()));
                return ExtractionResult::new(
                    format!("Error: File not found {}", missing.display()),
                    trace,
                );
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "image unreadable");
                trace.push(format!("Exception: {err}"));
                return ExtractionResult::new(format!("Error reading image: {err}"), trace);
            }
        };

        let bag = collect_metadata(container, &mut trace);
        let text = select_prompt(&bag, &mut trace);
        debug!(
            path = %path.display(),
            text_chars = text.chars().count(),
            trace_lines = trace.len(),
            "prompt extracted"
        );
        ExtractionResult::new(text, trace)
    }
}

/// Extracts with the filesystem reader.
pub fn extract(path: &Path) -> ExtractionResult {
    PromptExtractor::new().extract(path)
}

/// Native fields first, then recognized IFD0 tags in id order, then the
/// Exif sub-IFD UserComment.
pub fn collect_metadata(container: ContainerMetadata, trace: &mut ExtractionTrace) -> MetadataBag {
    let ContainerMetadata {
        text_fields,
        exif,
        warnings,
    } = container;

    let mut bag = MetadataBag::from_native(text_fields);
    if !bag.is_empty() {
        trace.push(format!(
            "Native metadata fields: {}",
            bag.keys().collect::<Vec<_>>().join(", ")
        ));
    }
    for warning in warnings {
        trace.push(format!("Error reading Exif: {warning}"));
    }

    let primary = exif
        .primary
        .iter()
        .filter_map(|(id, raw)| TagSlot::from_id(*id).map(|slot| (slot, raw)));
    let sub_ifd = exif
        .sub_ifd
        .get(&TagSlot::UserComment.id())
        .map(|raw| (TagSlot::UserComment, raw));

    for (slot, raw) in primary.chain(sub_ifd) {
        let (text, lines) = decode_tag(slot, raw);
        trace.extend(lines);
        let tag = DecodedTag { slot, text };
        let lines = match slot {
            TagSlot::UserComment => merge_user_comment(&mut bag, &tag),
            _ => classify_and_merge(&mut bag, &tag),
        };
        trace.extend(lines);
    }
    bag
}

/// Runs [`STRATEGIES`] in order and falls back to [`NO_METADATA_MESSAGE`].
pub fn select_prompt(bag: &MetadataBag, trace: &mut ExtractionTrace) -> String {
    for (name, strategy) in STRATEGIES {
        if let Some(text) = strategy(bag, trace) {
            debug!(strategy = name, "prompt strategy matched");
            return text;
        }
    }
    trace.push("No metadata found.");
    NO_METADATA_MESSAGE.to_string()
}

pub fn from_user_comment(bag: &MetadataBag, trace: &mut ExtractionTrace) -> Option<String> {
    let prompt = bag.canonical(CanonicalField::UserCommentPrompt)?;
    trace.push("Found prompt in UserComment.");
    Some(prompt.to_string())
}

pub fn from_parameters(bag: &MetadataBag, trace: &mut ExtractionTrace) -> Option<String> {
    let parameters = bag.canonical(CanonicalField::Parameters)?;
    trace.push("Found 'parameters' in metadata (A1111 format).");
    let prompt = truncate_positive_prompt(parameters);
    if prompt.is_empty() {
        trace.push("  -> Positive prompt is empty.");
    }
    Some(prompt)
}

pub fn from_prompt_graph(bag: &MetadataBag, trace: &mut ExtractionTrace) -> Option<String> {
    let raw = bag.canonical(CanonicalField::Prompt)?;
    trace.push("Found 'prompt' in metadata (ComfyUI format). Parsing JSON...");

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            trace.push(format!("JSON Decode Error on prompt metadata: {err}"));
            return Some(format!("Prompt (Raw):\n{raw}"));
        }
    };
    // Valid JSON that is not a node map has no text nodes: raw dump below.
    let graph = GenerationGraph::from_value(&value).unwrap_or_default();
    trace.push(format!("Nodes found: {:?}", graph.class_types()));

    let texts = collect_node_texts(&graph, trace);
    if texts.is_empty() {
        trace.push("No valid text found in target nodes. Returning raw dump.");
        return Some(format!("Raw Prompt Data:\n{raw}"));
    }
    Some(texts.join(TEXT_SEPARATOR))
}

pub fn from_workflow_only(bag: &MetadataBag, trace: &mut ExtractionTrace) -> Option<String> {
    if !bag.contains(CanonicalField::Workflow) {
        return None;
    }
    trace.push("Only 'workflow' metadata found.");
    Some(WORKFLOW_ONLY_MESSAGE.to_string())
}

/// Distinct texts of all text-producing nodes, in document order.
pub fn collect_node_texts(graph: &GenerationGraph, trace: &mut ExtractionTrace) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (id, node) in graph.iter() {
        if !is_text_node(&node.class_type) {
            continue;
        }
        trace.push(format!("Inspecting Node {id} ({})...", node.class_type));

        // Each key gets its own visited set.
        let resolved = NODE_TEXT_KEYS.iter().find_map(|key| {
            resolve(id, key, graph, &mut HashSet::new()).filter(|value| !value.is_empty())
        });

        match resolved {
            Some(Resolved::Text(text)) if !text.trim().is_empty() => {
                if found.contains(&text) {
                    trace.push(format!(
                        "  -> Duplicate skipped: {}",
                        truncate_text(&text, DUPLICATE_PREVIEW_CHARS)
                    ));
                } else {
                    trace.push(format!(
                        "  -> Extracted: {}",
                        truncate_text(&text, EXTRACTED_PREVIEW_CHARS)
                    ));
                    found.push(text);
                }
            }
            Some(unresolved @ Resolved::UnresolvedLink(_)) => {
                trace.push(format!("  -> Unresolved Link: {unresolved}"));
            }
            _ => trace.push("  -> No text value found."),
        }
    }
    found
}

fn is_text_node(class_type: &str) -> bool {
    TEXT_NODE_MARKERS
        .iter()
        .any(|marker| class_type.contains(marker))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
