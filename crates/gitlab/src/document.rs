//! Format-independent document tree.
//!
//! The emitter produces a [`Node`]; encoding it as YAML is a separate step
//! so the pipeline model never depends on the serializer's value types.

use crate::error::Result;
use crate::pipeline::VariableValue;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A document value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Integer(i64),
    /// String
    String(String),
    /// Ordered list
    Sequence(Vec<Node>),
    /// Insertion-ordered mapping
    Mapping(IndexMap<String, Node>),
}

impl Node {
    /// Mapping lookup; `None` for other node kinds.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// String content; `None` for other node kinds.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Sequence content; `None` for other node kinds.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<VariableValue> for Node {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::String(value) => Self::String(value),
            VariableValue::Integer(value) => Self::Integer(value),
            VariableValue::Bool(value) => Self::Bool(value),
        }
    }
}

impl<T: Into<Self>> From<Vec<T>> for Node {
    fn from(values: Vec<T>) -> Self {
        Self::Sequence(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<IndexMap<String, T>> for Node {
    fn from(values: IndexMap<String, T>) -> Self {
        Self::Mapping(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Encode a document as YAML.
///
/// # Errors
///
/// Returns [`crate::Error::Encode`] if the serializer fails.
pub fn encode_yaml(node: &Node) -> Result<String> {
    Ok(serde_yaml::to_string(node)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_keeps_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("zeta".to_string(), Node::from(1));
        map.insert("alpha".to_string(), Node::from(true));
        map.insert("list".to_string(), Node::from(vec!["a", "b"]));
        map.insert("nothing".to_string(), Node::Null);

        let yaml = encode_yaml(&Node::Mapping(map)).unwrap();
        assert_eq!(yaml, "zeta: 1\nalpha: true\nlist:\n- a\n- b\nnothing: null\n");
    }

    #[test]
    fn test_strings_that_look_like_other_types_are_quoted() {
        let yaml = encode_yaml(&Node::from(vec!["true", "1.0"])).unwrap();
        assert_eq!(yaml, "- 'true'\n- '1.0'\n");
    }

    #[test]
    fn test_accessors() {
        let mut map = IndexMap::new();
        map.insert("stages".to_string(), Node::from(vec!["build"]));
        let node = Node::Mapping(map);
        let stages = node.get("stages").and_then(Node::as_sequence).unwrap();
        assert_eq!(stages[0].as_str(), Some("build"));
        assert!(node.get("missing").is_none());
        assert!(Node::Null.get("x").is_none());
    }
}
