use thiserror::Error;

/// Result type alias for topic operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while enqueuing a message.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The topic's queue is at capacity (non-blocking publish only).
    #[error("topic {0} is full")]
    Full(String),

    /// The topic's queue has no receiving side left.
    #[error("topic {0} is closed")]
    Closed(String),
}
