use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Insertion-ordered property bag.
pub type PropertyMap = IndexMap<String, PropertyValue>;

/// A property value as sent by the graph endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<PropertyValue>),
    Map(PropertyMap),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Null => write!(f, "null"),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Flatten nested maps into `parent.child` keys, keeping order.
pub fn flatten_properties(properties: &PropertyMap) -> Vec<(String, String)> {
    fn walk(prefix: &str, map: &PropertyMap, out: &mut Vec<(String, String)>) {
        for (key, value) in map {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                PropertyValue::Map(inner) if !inner.is_empty() => walk(&path, inner, out),
                other => out.push((path, other.to_string())),
            }
        }
    }

    let mut out = Vec::new();
    walk("", properties, &mut out);
    out
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(i) => i.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Node {
    /// Text shown next to the node; falls back to the id.
    pub fn display_label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => label,
            _ => &self.id,
        }
    }

    /// Hover text, taken from the `description` property when present.
    pub fn description(&self) -> Option<&str> {
        match self.properties.get("description") {
            Some(PropertyValue::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "startNode", deserialize_with = "id_from_string_or_number")]
    pub from: String,
    #[serde(rename = "endNode", deserialize_with = "id_from_string_or_number")]
    pub to: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl Edge {
    pub fn touches(&self, node_id: &str) -> bool {
        self.from == node_id || self.to == node_id
    }
}

/// A complete graph as returned by `GET /graph`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(rename = "relationships", default)]
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Indices of edges whose endpoints are not in the node set.
    pub fn dangling_edges(&self) -> Vec<usize> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| !ids.contains(e.from.as_str()) || !ids.contains(e.to.as_str()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Node count per type, in first-seen order.
    pub fn kind_counts(&self) -> Vec<(String, usize)> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for node in &self.nodes {
            *counts.entry(node.kind.clone()).or_insert(0) += 1;
        }
        counts.into_iter().collect()
    }
}
