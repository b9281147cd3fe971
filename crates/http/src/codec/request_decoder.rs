//! Server-side decoder: request head, then the request payload.
//!
//! The decoder is a two-phase state machine, the phase being encoded in
//! `payload_decoder`: `None` while a head is being parsed, `Some` while
//! its body is. When the payload decoder reports `Eof` the field reverts
//! to `None` and the next pipelined request can be decoded by the same
//! instance; no explicit reset is needed.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::RequestHeadDecoder;
use crate::config::DecodeLimits;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

pub struct RequestDecoder {
    head_decoder: RequestHeadDecoder,
    payload_decoder: Option<PayloadDecoder>,
    limits: DecodeLimits,
}

impl RequestDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { head_decoder: RequestHeadDecoder::new(limits), payload_decoder: None, limits }
    }

    /// True when the decoder sits between messages.
    pub fn is_idle(&self) -> bool {
        self.payload_decoder.is_none()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
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
                // an empty body has no payload phase: the decoder goes
                // straight back to expecting the next pipelined head
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
            // clean close between messages
            Ok(None)
        } else {
            Err(ParseError::invalid_body("connection closed inside a request head"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn decoder() -> RequestDecoder {
        RequestDecoder::new(DecodeLimits::default())
    }

    #[test]
    fn head_then_body_then_idle() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from("POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello");

        let message = decoder.decode(&mut buf).unwrap().unwrap();
        let Message::Header((header, payload_size)) = message else { panic!("expected a head") };
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(5));
        assert!(!decoder.is_idle());

        let chunk = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"hello");

        let eof = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert!(eof.is_eof());
        assert!(decoder.is_idle());
    }

    #[test]
    fn pipelined_requests_in_one_buffer() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from("GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n");

        let Message::Header((first, _)) = decoder.decode(&mut buf).unwrap().unwrap() else {
            panic!("expected first head")
        };
        assert_eq!(first.uri().path(), "/a");
        // empty bodies have no payload phase: the next frame is the next head
        assert!(decoder.is_idle());

        let Message::Header((second, _)) = decoder.decode(&mut buf).unwrap().unwrap() else {
            panic!("expected second head")
        };
        assert_eq!(second.uri().path(), "/b");

        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn chunked_upload() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from(
            "POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        );

        let Message::Header((_, payload_size)) = decoder.decode(&mut buf).unwrap().unwrap() else {
            panic!("expected a head")
        };
        assert!(payload_size.is_chunked());

        let mut body = Vec::new();
        loop {
            match decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap() {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Eof => break,
            }
        }
        assert_eq!(body, b"hello world");
        assert!(decoder.is_idle());
        assert!(buf.is_empty());
    }

    #[test]
    fn eof_between_messages_is_clean() {
        let mut decoder = decoder();
        let mut buf = BytesMut::new();
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn eof_inside_a_head_is_an_error() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from("GET /a HTTP/1.1\r\nHost:");
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(decoder.decode_eof(&mut buf).is_err());
    }

    #[test]
    fn eof_inside_a_body_is_an_error() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from("POST /u HTTP/1.1\r\nHost: x\r\nContent-Length: 10\r\n\r\nabc");

        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_header());
        // the truncated prefix still comes out as data
        assert!(decoder.decode_eof(&mut buf).unwrap().unwrap().is_payload());
        assert!(decoder.decode_eof(&mut buf).is_err());
    }
}
