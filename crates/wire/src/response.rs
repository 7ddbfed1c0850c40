use std::fmt;

use crate::error::ParseError;
use crate::message::DELIMITER;

const OK: &str = "OK";
const ERR: &str = "ERR";
const NO_MESSAGES: &str = "NO_MESSAGES";
const TOPIC_DOES_NOT_EXIST: &str = "TOPIC_DOES_NOT_EXIST";

/// A single response line sent from the broker to a client.
///
/// Timeouts and unknown topics are ordinary `OK` outcomes. Only client input
/// errors are sent as `ERR`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// A message was delivered: `OK|<payload>`.
    Delivered(String),

    /// The poll timed out with nothing to deliver: `OK|NO_MESSAGES`.
    NoMessages,

    /// The polled topic has never been written to: `OK|TOPIC_DOES_NOT_EXIST`.
    TopicDoesNotExist,

    /// The request could not be understood: `ERR|<reason>`.
    Error(String),
}

impl Response {
    /// Serializes the response as a line (without trailing newline).
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Delivered(payload) => format!("{OK}{DELIMITER}{payload}"),
            Self::NoMessages => format!("{OK}{DELIMITER}{NO_MESSAGES}"),
            Self::TopicDoesNotExist => format!("{OK}{DELIMITER}{TOPIC_DOES_NOT_EXIST}"),
            Self::Error(reason) => format!("{ERR}{DELIMITER}{reason}"),
        }
    }

    /// Parses a response line.
    ///
    /// A delivered payload that is literally `NO_MESSAGES` or
    /// `TOPIC_DOES_NOT_EXIST` is indistinguishable from those outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedResponse`] if the line does not start
    /// with `OK|` or `ERR|`.
    pub fn decode(line: &str) -> Result<Self, ParseError> {
        match line.split_once(DELIMITER) {
            Some((OK, NO_MESSAGES)) => Ok(Self::NoMessages),
            Some((OK, TOPIC_DOES_NOT_EXIST)) => Ok(Self::TopicDoesNotExist),
            Some((OK, payload)) => Ok(Self::Delivered(payload.to_string())),
            Some((ERR, reason)) => Ok(Self::Error(reason.to_string())),
            _ => Err(ParseError::MalformedResponse(line.to_string())),
        }
    }

    /// Returns `true` for `ERR` responses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<ParseError> for Response {
    fn from(error: ParseError) -> Self {
        Self::Error(error.to_string())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        assert_eq!(
            Response::Delivered("order-42".to_string()).encode(),
            "OK|order-42"
        );
        assert_eq!(Response::NoMessages.encode(), "OK|NO_MESSAGES");
        assert_eq!(
            Response::TopicDoesNotExist.encode(),
            "OK|TOPIC_DOES_NOT_EXIST"
        );
        assert_eq!(
            Response::from(ParseError::MalformedMessage(2)).encode(),
            "ERR|malformed message: expected 3 fields, got 2"
        );
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            Response::decode("OK|a|b").unwrap(),
            Response::Delivered("a|b".to_string())
        );
        assert_eq!(Response::decode("OK|").unwrap(), Response::Delivered(String::new()));
        assert_eq!(Response::decode("OK|NO_MESSAGES").unwrap(), Response::NoMessages);
        assert!(Response::decode("ERR|unknown intent: X").unwrap().is_error());
        assert!(Response::decode("HELLO").is_err());
        assert!(Response::decode("NOPE|x").is_err());
    }
}
