//! Encoder for bodies framed by `Content-Length`.

use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tracing::warn;

/// Copies body bytes through while counting down the declared length.
/// Bytes past the declared length are dropped with a warning rather than
/// corrupting the framing of the next message on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    received_eof: bool,
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { received_eof: false, remaining: length }
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0 && self.received_eof
    }

    pub fn encode<D: Buf>(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), SendError> {
        match item {
            PayloadItem::Chunk(bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                let len = bytes.remaining() as u64;
                if len > self.remaining {
                    warn!(excess = len - self.remaining, "body exceeds the declared content-length");
                    return Err(SendError::invalid_body("body exceeds the declared content-length"));
                }
                dst.extend_from_slice(bytes.chunk());
                self.remaining -= len;
                Ok(())
            }
            PayloadItem::Eof => {
                if self.remaining > 0 {
                    return Err(SendError::invalid_body("body shorter than the declared content-length"));
                }
                self.received_eof = true;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn passes_exactly_the_declared_bytes() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hel")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"lo")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"hello");
        assert!(encoder.is_finished());
    }

    #[test]
    fn overflow_is_rejected() {
        let mut encoder = LengthEncoder::new(2);
        let mut dst = BytesMut::new();
        assert!(encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).is_err());
    }

    #[test]
    fn short_body_is_rejected() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ab")), &mut dst).unwrap();
        assert!(encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).is_err());
    }
}
