//! Line framing for the wire
//!
//! The substrate speaks one JSON object per line. The decoder hands raw
//! lines to the runtime (which owns the decode-and-salvage policy for bad
//! input); the encoder serializes envelopes.

use bytes::{BufMut, BytesMut};
use floodcast_core::Envelope;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum line size (1 MB)
const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Framing errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("line too long: {0} bytes (max {MAX_LINE_BYTES})")]
    TooLong(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Codec for newline-delimited JSON envelopes
pub struct LineCodec {
    max_line_bytes: usize,
}

impl LineCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            max_line_bytes: MAX_LINE_BYTES,
        }
    }

    /// Create a codec with a custom line limit
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self { max_line_bytes }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                // No terminator yet; an unterminated line past the limit is
                // a protocol violation, not a partial read.
                if src.len() > self.max_line_bytes {
                    return Err(CodecError::TooLong(src.len()));
                }
                return Ok(None);
            };

            if pos + 1 > self.max_line_bytes {
                return Err(CodecError::TooLong(pos + 1));
            }

            let frame = src.split_to(pos + 1);
            let mut line = &frame[..pos];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
            if line.is_empty() {
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

impl Encoder<Envelope> for LineCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)?;
        if json.len() + 1 > self.max_line_bytes {
            return Err(CodecError::TooLong(json.len() + 1));
        }

        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use floodcast_core::{Body, NodeId, Payload};

    #[test]
    fn test_decode_splits_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":2}\n{\"c\""[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"b\":2}"));
        // Trailing partial line waits for more input
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b":3}\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"c\":3}"));
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"\n\n{\"a\":1}\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_decode_rejects_oversized_line() {
        let mut codec = LineCodec::with_max_line_bytes(16);
        let mut buf = BytesMut::from(&b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(CodecError::TooLong(_))
        ));
    }

    #[test]
    fn test_encode_writes_one_json_line() {
        let mut codec = LineCodec::new();
        let env = Envelope {
            src: NodeId::new("n1"),
            dest: NodeId::new("n2"),
            body: Body::request(1, Payload::Broadcast { message: 42 }),
        };

        let mut buf = BytesMut::new();
        codec.encode(env, &mut buf).unwrap();

        assert_eq!(buf[buf.len() - 1], b'\n');
        let parsed: serde_json::Value = serde_json::from_slice(&buf[..buf.len() - 1]).unwrap();
        assert_eq!(parsed["dest"], "n2");
        assert_eq!(parsed["body"]["message"], 42);
    }
}
