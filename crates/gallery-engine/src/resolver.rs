//! Link-following over a generation graph.
//!
//! The walk is depth-first with an explicit visited set owned by the caller.
//! Every node is entered at most once per set, so a walk is bounded by the
//! number of nodes even when links form cycles.

use std::collections::HashSet;
use std::fmt;

use gallery_contracts::{GenerationGraph, InputValue, Link};

/// Input keys tried, in order, on the node a link points at.
pub const LINKED_VALUE_KEYS: [&str; 5] = ["text", "string", "value", "string_field", "prompt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Text(String),
    /// A link whose target is missing, already visited, or holds no text.
    UnresolvedLink(String),
}

impl Resolved {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::UnresolvedLink(target) => write!(f, "<Link to Node {target}>"),
        }
    }
}

/// Value of `input_key` on `node_id`. `None` when the node is missing or
/// already visited, the key is absent, or the input is neither a scalar nor
/// a link.
pub fn resolve(
    node_id: &str,
    input_key: &str,
    graph: &GenerationGraph,
    visited: &mut HashSet<String>,
) -> Option<Resolved> {
    if visited.contains(node_id) {
        return None;
    }
    let node = graph.get(node_id)?;
    visited.insert(node_id.to_string());
    resolve_value(node.input(input_key)?, graph, visited)
}

fn resolve_value(
    value: &InputValue,
    graph: &GenerationGraph,
    visited: &mut HashSet<String>,
) -> Option<Resolved> {
    match value {
        InputValue::Literal(text) => Some(Resolved::Text(text.clone())),
        InputValue::Link(link) => Some(follow_link(link, graph, visited)),
        InputValue::Other(_) => None,
    }
}

fn follow_link(link: &Link, graph: &GenerationGraph, visited: &mut HashSet<String>) -> Resolved {
    if visited.contains(&link.target) {
        return Resolved::UnresolvedLink(link.target.clone());
    }
    let Some(target) = graph.get(&link.target) else {
        return Resolved::UnresolvedLink(link.target.clone());
    };
    visited.insert(link.target.clone());

    // Report the deepest dead end rather than this hop when nothing resolves.
    let mut dead_end = None;
    for key in LINKED_VALUE_KEYS {
        let Some(value) = target.input(key) else {
            continue;
        };
        match resolve_value(value, graph, visited) {
            Some(Resolved::Text(text)) if !text.is_empty() => return Resolved::Text(text),
            Some(Resolved::UnresolvedLink(id)) => {
                dead_end.get_or_insert(id);
            }
            _ => {}
        }
    }
    Resolved::UnresolvedLink(dead_end.unwrap_or_else(|| link.target.clone()))
}
