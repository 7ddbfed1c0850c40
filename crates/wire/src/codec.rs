//! `tokio-util` codecs for both ends of a connection.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::{Error, ParseError};
use crate::message::Message;
use crate::response::Response;

/// Maximum line length accepted by default (64 KiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

fn put_line(line: &str, buf: &mut BytesMut) {
    buf.reserve(line.len() + 1);
    buf.put_slice(line.as_bytes());
    buf.put_u8(b'\n');
}

/// Broker-side codec: decodes request lines and encodes responses.
///
/// A line that fails to parse is yielded as `Ok(Some(Err(_)))` rather than
/// as a stream error, so a framed reader keeps going after bad input. That
/// includes lines that are not UTF-8. Only transport failures end the stream.
#[derive(Debug)]
pub struct ServerCodec {
    lines: LinesCodec,
}

impl ServerCodec {
    /// Creates a codec with [`DEFAULT_MAX_LINE_LENGTH`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Creates a codec rejecting lines longer than `max` bytes.
    #[must_use]
    pub fn with_max_line_length(max: usize) -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(max),
        }
    }

    fn map_line(
        &self,
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Result<Message, ParseError>>, Error> {
        match result {
            Ok(Some(line)) => Ok(Some(Message::decode(&line))),
            Ok(None) => Ok(None),
            // LinesCodec discards the rest of the oversized line on the next call.
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(Err(ParseError::LineTooLong(self.lines.max_length()))))
            }
            // LinesCodec has already consumed the offending line.
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Err(ParseError::InvalidUtf8)))
            }
            Err(LinesCodecError::Io(e)) => Err(Error::Io(e)),
        }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = Result<Message, ParseError>;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let result = self.lines.decode(buf);
        self.map_line(result)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let result = self.lines.decode_eof(buf);
        self.map_line(result)
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, response: Response, buf: &mut BytesMut) -> Result<(), Self::Error> {
        put_line(&response.encode(), buf);
        Ok(())
    }
}

/// Client-side codec: encodes requests and decodes responses.
#[derive(Debug)]
pub struct ClientCodec {
    lines: LinesCodec,
}

impl ClientCodec {
    /// Creates a codec with [`DEFAULT_MAX_LINE_LENGTH`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(DEFAULT_MAX_LINE_LENGTH),
        }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.lines.decode(buf) {
            Ok(Some(line)) => Ok(Some(Response::decode(&line)?)),
            Ok(None) => Ok(None),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Err(ParseError::LineTooLong(self.lines.max_length()).into())
            }
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Err(ParseError::InvalidUtf8.into())
            }
            Err(LinesCodecError::Io(e)) => Err(Error::Io(e)),
        }
    }
}

impl Encoder<Message> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, message: Message, buf: &mut BytesMut) -> Result<(), Self::Error> {
        put_line(&message.encode(), buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from("WRITE|orders|");

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"order-42\r\n");
        let message = codec.decode(&mut buf).unwrap().unwrap().unwrap();

        assert_eq!(message.payload(), "order-42");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bad_line_does_not_error_stream() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from("garbage\nPOLL|orders|\n");

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Err(ParseError::MalformedMessage(1)));

        let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(second.topic(), "orders");
    }

    #[test]
    fn test_line_too_long_then_recovers() {
        let mut codec = ServerCodec::with_max_line_length(16);
        let mut buf = BytesMut::from("WRITE|orders|0123456789abcdef\nPOLL|orders|\n");

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Err(ParseError::LineTooLong(16)));

        let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(second.encode(), "POLL|orders|");
    }

    #[test]
    fn test_invalid_utf8_then_recovers() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(&b"WRITE|t|\xff\xfe\nPOLL|orders|\n"[..]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, Err(ParseError::InvalidUtf8));

        let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(second.topic(), "orders");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_last_line_without_newline() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from("WRITE|orders|tail");

        assert!(codec.decode(&mut buf).unwrap().is_none());
        let message = codec.decode_eof(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(message.payload(), "tail");
    }

    #[test]
    fn test_encode_response_line() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(Response::NoMessages, &mut buf).unwrap();

        assert_eq!(&buf[..], b"OK|NO_MESSAGES\n");
    }

    #[test]
    fn test_client_codec() {
        let mut codec = ClientCodec::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Message::write("orders", "order-42").unwrap(), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"WRITE|orders|order-42\n");

        let mut buf = BytesMut::from("OK|order-42\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Response::Delivered("order-42".to_string()))
        );
    }
}
