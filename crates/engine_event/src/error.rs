//! Event-layer error types.

/// Failure raised by a listener's reaction.
///
/// The bus never propagates these to the dispatcher; they go to the
/// configured [`DiagnosticSink`](crate::DiagnosticSink).
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The reaction reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The reaction panicked and the bus caught the unwind.
    #[error("listener panicked: {0}")]
    Panicked(String),

    /// Any other error surfaced by a reaction.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error>),
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors raised while loading bus configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration was not valid JSON for the expected shape.
    #[error("failed to parse bus config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A declared channel name was empty.
    #[error("channel name at position {0} is empty")]
    EmptyChannelName(usize),
}
