//! Callback invocation errors

use thiserror::Error;

/// A script callback raised instead of returning.
///
/// Produced at the invocation boundary (timers, frames, sockets) and logged
/// there; it never propagates into the host loop.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct CallbackError {
    pub message: String,
    pub stack: Option<String>,
}

impl CallbackError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        let stack = stack.into();
        if !stack.is_empty() {
            self.stack = Some(stack);
        }
        self
    }
}
