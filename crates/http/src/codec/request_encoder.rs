//! Client-side encoder: request head, then the request payload.

use crate::codec::body::PayloadEncoder;
use crate::codec::header::RequestHeadEncoder;
use crate::protocol::{Message, PayloadSize, SendError};
use bytes::{Buf, BytesMut};
use http::Request;
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

pub struct RequestEncoder {
    head_encoder: RequestHeadEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestEncoder {
    fn default() -> Self {
        Self { head_encoder: RequestHeadEncoder, payload_encoder: None }
    }
}

impl<D: Buf> Encoder<Message<(Request<()>, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(Request<()>, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expected a payload item but received a request head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_encoder = PayloadEncoder::new(payload_size)?;
                self.payload_encoder = if payload_encoder.is_finished() { None } else { Some(payload_encoder) };
                self.head_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(item) => {
                let payload_encoder = match &mut self.payload_encoder {
                    Some(encoder) => encoder,
                    None => {
                        error!("expected a request head but received a payload item");
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
