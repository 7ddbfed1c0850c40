use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection closed before a response arrived.
    #[error("connection closed by broker")]
    ConnectionClosed,

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] relay_wire::ParseError),

    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The broker answered with `ERR|<reason>`.
    #[error("rejected by broker: {0}")]
    Rejected(String),

    /// Framing failure.
    #[error(transparent)]
    Wire(#[from] relay_wire::Error),
}
