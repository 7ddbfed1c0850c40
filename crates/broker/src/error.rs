use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the broker.
#[derive(Debug, Error)]
pub enum Error {
    /// The server has already been started.
    #[error("the server has already been started")]
    AlreadyStarted,

    /// Failed to bind the listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// The address we tried to bind.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Transport error on a single connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Framing error on a single connection.
    #[error(transparent)]
    Wire(#[from] relay_wire::Error),
}
