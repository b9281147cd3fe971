//! Unified body encoder selecting the strategy from the message framing.

use crate::codec::body::{ChunkedEncoder, LengthEncoder};
use crate::protocol::{PayloadItem, PayloadSize, SendError};
use bytes::{Buf, BytesMut};

/// Encodes a message body according to its [`PayloadSize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthEncoder),
    Chunked(ChunkedEncoder),
    NoBody,
}

impl PayloadEncoder {
    pub fn new(payload_size: PayloadSize) -> Result<Self, SendError> {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthEncoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(ChunkedEncoder::new()),
            PayloadSize::Empty => Kind::NoBody,
            PayloadSize::UntilClose => {
                return Err(SendError::invalid_body("refusing to send a message without explicit framing"));
            }
        };
        Ok(Self { kind })
    }

    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    /// True once the whole body, terminator included, has been encoded.
    pub fn is_finished(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finished(),
            Kind::Chunked(encoder) => encoder.is_finished(),
            Kind::NoBody => true,
        }
    }

    pub fn encode<D: Buf>(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), SendError> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::NoBody => Ok(()),
        }
    }
}
