//! Position-carrying document tree.
//!
//! `serde_yaml` parses into an untyped [`serde_yaml::Value`] without source
//! positions. The decoder needs to point at the node that caused a problem, so
//! values are converted into [`Node`]s that remember where they came from: the
//! source name, the document index inside the stream and the structural path
//! from the document root (`files[2]./etc/motd.mode`).

use std::fmt;
use std::sync::Arc;

/// Location of a node inside a YAML stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mark {
    pub source: Option<Arc<str>>,
    pub document: usize,
    pub path: String,
}

impl Mark {
    pub fn root(source: Option<Arc<str>>, document: usize) -> Self {
        Self {
            source,
            document,
            path: String::new(),
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self {
            source: self.source.clone(),
            document: self.document,
            path: format!("{}[{}]", self.path, index),
        }
    }

    pub fn key(&self, key: &str) -> Self {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        };
        Self {
            source: self.source.clone(),
            document: self.document,
            path,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}, ", source)?;
        }
        write!(f, "document {}", self.document)?;
        if !self.path.is_empty() {
            write!(f, ", at {}", self.path)?;
        }
        Ok(())
    }
}

/// Scalar payload of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// A scalar carrying an explicit tag, e.g. `!!binary aGk=`.
    Tagged { tag: String, value: String },
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render the scalar the way it would be written in a document.
    pub fn render(&self) -> String {
        match self {
            Scalar::Null => "~".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::String(s) => s.clone(),
            Scalar::Tagged { tag, value } => format!("{} {}", tag, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub mark: Mark,
}

impl Node {
    pub fn scalar(scalar: Scalar, mark: Mark) -> Self {
        Self {
            kind: NodeKind::Scalar(scalar),
            mark,
        }
    }

    /// Short name of the node shape, used in error messages.
    pub fn id(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar(_) => "scalar",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Mapping(_) => "mapping",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(Scalar::Null))
    }

    /// Convert a parsed YAML value rooted at `mark`.
    pub fn from_yaml(value: &serde_yaml::Value, mark: Mark) -> Self {
        use serde_yaml::Value;

        let kind = match value {
            Value::Null => NodeKind::Scalar(Scalar::Null),
            Value::Bool(b) => NodeKind::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    NodeKind::Scalar(Scalar::Integer(i))
                } else {
                    NodeKind::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => NodeKind::Scalar(Scalar::String(s.clone())),
            Value::Sequence(seq) => NodeKind::Sequence(
                seq.iter()
                    .enumerate()
                    .map(|(i, item)| Node::from_yaml(item, mark.index(i)))
                    .collect(),
            ),
            Value::Mapping(map) => NodeKind::Mapping(
                map.iter()
                    .map(|(k, v)| {
                        let key = Node::from_yaml(k, mark.clone());
                        let label = key
                            .as_scalar()
                            .map(Scalar::render)
                            .unwrap_or_else(|| key.id().to_string());
                        let value = Node::from_yaml(v, mark.key(&label));
                        (key, value)
                    })
                    .collect(),
            ),
            Value::Tagged(tagged) => match &tagged.value {
                Value::String(s) => NodeKind::Scalar(Scalar::Tagged {
                    tag: tagged.tag.to_string(),
                    value: s.clone(),
                }),
                // Tags on collections carry no meaning for bundles.
                other => return Node::from_yaml(other, mark),
            },
        };

        Node { kind, mark }
    }
}
