use bridge_core::CallbackError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// Script raised during evaluation.
    #[error("script error: {0}")]
    Script(#[from] CallbackError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bundle not found: {0}")]
    BundleNotFound(PathBuf),

    /// Engine construction failed; nothing was installed.
    #[error("failed to bootstrap script engine: {0}")]
    Bootstrap(String),

    #[error("script runtime accessed from a thread other than the host thread")]
    WrongThread,

    #[error("script runtime accessed re-entrantly")]
    Reentrant,
}

impl HostError {
    pub(crate) fn bootstrap(err: impl std::fmt::Display) -> Self {
        HostError::Bootstrap(err.to_string())
    }
}
