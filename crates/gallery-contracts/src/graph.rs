use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Reference to another node's output: "use whatever `target` emits on `slot`".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub target: String,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// String, number or boolean, already rendered as text.
    Literal(String),
    Link(Link),
    /// Anything else (null, objects, arrays that are not links).
    Other(Value),
}

impl InputValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(text) => Self::Literal(text.clone()),
            Value::Number(number) => Self::Literal(number.to_string()),
            Value::Bool(flag) => Self::Literal(flag.to_string()),
            Value::Array(items) if items.len() == 2 => match link_target(&items[0]) {
                Some(target) => Self::Link(Link {
                    target,
                    slot: items[1].as_u64().unwrap_or_default(),
                }),
                None => Self::Other(value.clone()),
            },
            other => Self::Other(other.clone()),
        }
    }
}

fn link_target(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeRecord {
    pub class_type: String,
    pub inputs: IndexMap<String, InputValue>,
}

impl NodeRecord {
    pub fn from_json(node: &Map<String, Value>) -> Self {
        let class_type = node
            .get("class_type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let inputs = node
            .get("inputs")
            .and_then(Value::as_object)
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|(key, value)| (key.clone(), InputValue::from_json(value)))
                    .collect()
            })
            .unwrap_or_default();
        Self { class_type, inputs }
    }

    pub fn input(&self, key: &str) -> Option<&InputValue> {
        self.inputs.get(key)
    }
}

/// A node-based generation pipeline, keyed by node id in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationGraph {
    nodes: IndexMap<String, NodeRecord>,
}

impl GenerationGraph {
    pub fn parse(raw: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(raw).context("generation graph is not valid JSON")?;
        Self::from_value(&value).context("generation graph is not a JSON object")
    }

    /// Entries whose value is not an object are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let nodes = value
            .as_object()?
            .iter()
            .filter_map(|(id, node)| {
                node.as_object()
                    .map(|node| (id.clone(), NodeRecord::from_json(node)))
            })
            .collect();
        Some(Self { nodes })
    }

    pub fn insert(&mut self, id: impl Into<String>, node: NodeRecord) {
        self.nodes.insert(id.into(), node);
    }

    pub fn get(&self, id: &str) -> Option<&NodeRecord> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn class_types(&self) -> Vec<&str> {
        self.nodes
            .values()
            .map(|node| node.class_type.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationGraph, InputValue, Link};

    #[test]
    fn parses_literals_and_links() -> anyhow::Result<()> {
        let graph = GenerationGraph::parse(
            r#"{
                "10": {"class_type": "CLIPTextEncode", "inputs": {"text": ["11", 0], "clip": [4, 1]}},
                "11": {"class_type": "PrimitiveNode", "inputs": {"value": "a red fox", "seed": 7, "flag": true}}
            }"#,
        )?;
        assert_eq!(graph.len(), 2);

        let encoder = graph.get("10").expect("node 10");
        assert_eq!(encoder.class_type, "CLIPTextEncode");
        assert_eq!(
            encoder.input("text"),
            Some(&InputValue::Link(Link {
                target: "11".to_string(),
                slot: 0
            }))
        );
        assert_eq!(
            encoder.input("clip"),
            Some(&InputValue::Link(Link {
                target: "4".to_string(),
                slot: 1
            }))
        );

        let primitive = graph.get("11").expect("node 11");
        assert_eq!(
            primitive.input("value"),
            Some(&InputValue::Literal("a red fox".to_string()))
        );
        assert_eq!(
            primitive.input("seed"),
            Some(&InputValue::Literal("7".to_string()))
        );
        assert_eq!(
            primitive.input("flag"),
            Some(&InputValue::Literal("true".to_string()))
        );
        Ok(())
    }

    #[test]
    fn preserves_document_order() -> anyhow::Result<()> {
        let graph = GenerationGraph::parse(
            r#"{"9": {"class_type": "B", "inputs": {}}, "2": {"class_type": "A", "inputs": {}}}"#,
        )?;
        assert_eq!(graph.class_types(), vec!["B", "A"]);
        Ok(())
    }

    #[test]
    fn skips_non_object_entries_and_tolerates_missing_inputs() {
        let graph = GenerationGraph::from_value(&json!({
            "1": "oops",
            "2": {"class_type": "Note"}
        }))
        .expect("object graph");
        assert_eq!(graph.len(), 1);
        assert!(graph.get("2").expect("node 2").inputs.is_empty());
    }

    #[test]
    fn non_link_arrays_and_null_are_other() {
        assert!(matches!(
            InputValue::from_json(&json!([1, 2, 3])),
            InputValue::Other(_)
        ));
        assert!(matches!(
            InputValue::from_json(&json!([null, 0])),
            InputValue::Other(_)
        ));
        assert!(matches!(InputValue::from_json(&json!(null)), InputValue::Other(_)));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(GenerationGraph::parse("[1, 2]").is_err());
        assert!(GenerationGraph::parse("not json").is_err());
    }
}
