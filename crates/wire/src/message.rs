use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Field delimiter used by request lines.
pub const DELIMITER: char = '|';

/// What a client wants to do with a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Remove and return the next message on the topic.
    Poll,

    /// Append a message to the topic, creating it if absent.
    Write,
}

impl Intent {
    /// The token used for this intent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Poll => "POLL",
            Self::Write => "WRITE",
        }
    }
}

impl FromStr for Intent {
    type Err = ParseError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "POLL" => Ok(Self::Poll),
            "WRITE" => Ok(Self::Write),
            other => Err(ParseError::UnknownIntent(other.to_string())),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded request line.
///
/// Messages are immutable once built. A published message is moved into its
/// topic's queue and handed to at most one poller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    intent: Intent,
    topic: String,
    payload: String,
}

impl Message {
    /// Builds a message, rejecting an empty topic.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyTopic`] if `topic` is empty.
    pub fn new(
        intent: Intent,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Result<Self, ParseError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ParseError::EmptyTopic);
        }

        Ok(Self {
            intent,
            topic,
            payload: payload.into(),
        })
    }

    /// Shorthand for a `WRITE` message.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyTopic`] if `topic` is empty.
    pub fn write(topic: impl Into<String>, payload: impl Into<String>) -> Result<Self, ParseError> {
        Self::new(Intent::Write, topic, payload)
    }

    /// Shorthand for a `POLL` message, which carries no payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyTopic`] if `topic` is empty.
    pub fn poll(topic: impl Into<String>) -> Result<Self, ParseError> {
        Self::new(Intent::Poll, topic, String::new())
    }

    /// Parses a request line (without its trailing newline).
    ///
    /// Only the first two delimiters split the line; everything after the
    /// second one is the payload, verbatim.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the line has fewer than three fields,
    /// an empty topic, or an unrecognised intent.
    pub fn decode(line: &str) -> Result<Self, ParseError> {
        let mut fields = line.splitn(3, DELIMITER);

        let (Some(intent), Some(topic), Some(payload)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ParseError::MalformedMessage(line.split(DELIMITER).count()));
        };

        Self::new(intent.parse()?, topic, payload)
    }

    /// Serializes the message as a request line (without trailing newline).
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{DELIMITER}{}{DELIMITER}{}",
            self.intent, self.topic, self.payload
        )
    }

    /// The intent of this request.
    #[must_use]
    pub const fn intent(&self) -> Intent {
        self.intent
    }

    /// The topic this request targets.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The message body.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consumes the message, returning its body.
    #[must_use]
    pub fn into_payload(self) -> String {
        self.payload
    }
}
