//! Line-oriented wire protocol for the relay broker.
//!
//! Every frame is a single line of UTF-8 text terminated by `\n`:
//!
//! - Requests: `INTENT|TOPIC|PAYLOAD`, where `INTENT` is `POLL` or `WRITE`.
//! - Responses: `OK|<payload>` or `ERR|<reason>`.
//!
//! Requests are split on the first two delimiters only, so a payload may
//! itself contain `|`. A payload can never contain a newline since that
//! terminates the frame.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod codec;
mod error;
mod message;
mod response;

pub use codec::{ClientCodec, DEFAULT_MAX_LINE_LENGTH, ServerCodec};
pub use error::{Error, ParseError, Result};
pub use message::{DELIMITER, Intent, Message};
pub use response::Response;
