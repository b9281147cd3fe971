//! Client-side decoder: response head, then the response payload.
//!
//! Mirror image of [`RequestDecoder`](crate::codec::RequestDecoder), with
//! two response-only twists: the caller must flag responses to `HEAD`
//! requests (their heads advertise a body that never arrives), and a
//! response without explicit framing runs until the peer closes, which
//! surfaces here through `decode_eof`.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::ResponseHeadDecoder;
use crate::config::DecodeLimits;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

pub struct ResponseDecoder {
    head_decoder: ResponseHeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
    limits: DecodeLimits,
}

impl ResponseDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { head_decoder: ResponseHeadDecoder::new(limits), payload_decoder: None, limits }
    }

    /// Flags whether the next response head answers a `HEAD` request.
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_decoder.set_head_request(head_request);
    }

    pub fn is_idle(&self) -> bool {
        self.payload_decoder.is_none()
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };
            return Ok(message);
        }

        let message = match self.head_decoder.decode(src)? {
            Some((header, payload_size)) => {
                // an empty body has no payload phase
                self.payload_decoder = match payload_size {
                    PayloadSize::Empty => None,
                    other => Some(PayloadDecoder::new(other, &self.limits)),
                };
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode_eof(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };
            return Ok(message);
        }

        if let message @ Some(_) = self.decode(src)? {
            return Ok(message);
        }

        if src.is_empty() {
            Ok(None)
        } else {
            Err(ParseError::invalid_body("connection closed inside a response head"))
        }
    }
}
