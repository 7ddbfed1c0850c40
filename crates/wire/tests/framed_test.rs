//! Framing tests over an async reader.

use futures::StreamExt;
use relay_wire::{Intent, ParseError, ServerCodec};
use tokio_util::codec::FramedRead;

#[tokio::test]
async fn test_stream_survives_bad_lines() {
    let input: &[u8] = b"WRITE|orders|order-1\nBOGUS|orders|x\nWRITE|orders\nPOLL|orders|\n";
    let mut framed = FramedRead::new(input, ServerCodec::new());

    let first = framed.next().await.unwrap().unwrap().unwrap();
    assert_eq!(first.intent(), Intent::Write);
    assert_eq!(first.payload(), "order-1");

    assert_eq!(
        framed.next().await.unwrap().unwrap(),
        Err(ParseError::UnknownIntent("BOGUS".to_string()))
    );
    assert_eq!(
        framed.next().await.unwrap().unwrap(),
        Err(ParseError::MalformedMessage(2))
    );

    let last = framed.next().await.unwrap().unwrap().unwrap();
    assert_eq!(last.intent(), Intent::Poll);

    assert!(framed.next().await.is_none());
}
