use crate::types::SocketDirection;
use std::fmt;
use thiserror::Error;

/// Kind of scene entity a lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Object,
    Material,
    NodeTree,
    Node,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Object => "Object",
            EntityKind::Material => "Material",
            EntityKind::NodeTree => "Node tree",
            EntityKind::Node => "Node",
        })
    }
}

/// Errors raised by scene-graph operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    #[error("{name} is a {found} object, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("{direction} socket {index} out of range on node {node}")]
    SocketIndexOutOfRange {
        node: String,
        direction: SocketDirection,
        index: usize,
    },
}

impl SceneError {
    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        SceneError::NotFound {
            kind,
            name: name.into(),
        }
    }
}
