use bridge_scene::{EntityKind, SceneError, SocketDirection};
use thiserror::Error;

/// Why a command could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Unknown command type: {0}")]
    UnknownCommand(String),

    #[error("{command}: missing required field `{field}`")]
    MissingField { command: String, field: String },

    #[error("{command}: {message}")]
    InvalidField { command: String, message: String },

    #[error("{kind} not found: {name}")]
    EntityNotFound { kind: EntityKind, name: String },

    #[error("{name} is a {found} object, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{direction} socket not found: {socket} on {node}")]
    SocketNotFound {
        node: String,
        direction: SocketDirection,
        socket: String,
    },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),
}

impl CommandError {
    /// Stable name of the error kind, used as the thrown script error's `name`.
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownCommand(_) => "UnknownCommand",
            CommandError::MissingField { .. } => "MissingField",
            CommandError::InvalidField { .. } => "InvalidField",
            CommandError::EntityNotFound { .. } => "EntityNotFound",
            CommandError::TypeMismatch { .. } => "TypeMismatch",
            CommandError::SocketNotFound { .. } => "SocketNotFound",
            CommandError::UnknownNodeType(_) => "UnknownNodeType",
        }
    }

    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        CommandError::EntityNotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn invalid(command: &str, message: impl Into<String>) -> Self {
        CommandError::InvalidField {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Classify a payload decoding failure for `command`.
    pub(crate) fn from_decode(command: &str, err: serde_json::Error) -> Self {
        let message = err.to_string();
        let missing = message
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next());
        match missing {
            Some(field) => CommandError::MissingField {
                command: command.to_string(),
                field: field.to_string(),
            },
            None => CommandError::invalid(command, message),
        }
    }
}

impl From<SceneError> for CommandError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::NotFound { kind, name } => CommandError::EntityNotFound { kind, name },
            SceneError::TypeMismatch {
                name,
                expected,
                found,
            } => CommandError::TypeMismatch {
                name,
                expected,
                found,
            },
            SceneError::UnknownNodeType(node_type) => CommandError::UnknownNodeType(node_type),
            SceneError::SocketIndexOutOfRange {
                node,
                direction,
                index,
            } => CommandError::SocketNotFound {
                node,
                direction,
                socket: index.to_string(),
            },
        }
    }
}
