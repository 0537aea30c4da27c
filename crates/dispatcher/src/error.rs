//! Dispatcher error types.

use thiserror::Error;

/// Failures while building or feeding the sink fan-out.
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// A configured sink could not be instantiated; aborts dispatcher build.
    #[error("cannot create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Error bubbled up from a sink's write/flush/close path.
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
