use std::io;

use thiserror::Error;

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while framing lines on a connection.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A frame could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A single line that could not be turned into a message or response.
///
/// These are client input errors: they are reported back on the connection
/// and never terminate it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line did not have the three `INTENT|TOPIC|PAYLOAD` fields.
    #[error("malformed message: expected 3 fields, got {0}")]
    MalformedMessage(usize),

    /// The topic field was present but empty.
    #[error("malformed message: empty topic")]
    EmptyTopic,

    /// The line was not valid UTF-8.
    #[error("malformed message: invalid UTF-8")]
    InvalidUtf8,

    /// The intent token is not one of `POLL` or `WRITE`.
    #[error("unknown intent: {0}")]
    UnknownIntent(String),

    /// The line exceeded the configured maximum length.
    #[error("line too long: exceeds {0} bytes")]
    LineTooLong(usize),

    /// A response line did not start with `OK|` or `ERR|`.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
