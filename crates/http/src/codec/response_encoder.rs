//! Server-side encoder: response head, then the response payload.

use crate::codec::body::PayloadEncoder;
use crate::codec::header::ResponseHeadEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

pub struct ResponseEncoder {
    head_encoder: ResponseHeadEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Drops the pending payload phase without writing body bytes.
    ///
    /// Responses to `HEAD` requests keep their framing headers but must
    /// not carry a body; the connection calls this right after feeding
    /// the head.
    pub fn skip_payload(&mut self) {
        self.payload_encoder.take();
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { head_encoder: ResponseHeadEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expected a payload item but received a response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_encoder = PayloadEncoder::new(payload_size)?;
                self.payload_encoder = Some(payload_encoder);
                self.head_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(item) => {
                let payload_encoder = match &mut self.payload_encoder {
                    Some(encoder) => encoder,
                    None => {
                        error!("expected a response head but received a payload item");
                        return Err(io::Error::from(ErrorKind::InvalidInput).into());
                    }
                };

                let result = payload_encoder.encode(item, dst);

                if payload_encoder.is_finished() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}
