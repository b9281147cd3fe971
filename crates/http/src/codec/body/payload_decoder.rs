//! Unified body decoder selecting the strategy from the message framing.

use crate::codec::body::{ChunkedDecoder, LengthDecoder, UntilCloseDecoder};
use crate::config::DecodeLimits;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// Decodes a message body according to its [`PayloadSize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    UntilClose(UntilCloseDecoder),
    NoBody,
}

impl PayloadDecoder {
    pub fn new(payload_size: PayloadSize, limits: &DecodeLimits) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(ChunkedDecoder::new(limits.max_chunk_length)),
            PayloadSize::UntilClose => Kind::UntilClose(UntilCloseDecoder::new()),
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }

    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    /// True when EOF at this point would not truncate a body.
    pub fn can_end(&self) -> bool {
        match &self.kind {
            Kind::Length(decoder) => decoder.is_finished(),
            Kind::Chunked(decoder) => decoder.is_finished(),
            Kind::UntilClose(_) => true,
            Kind::NoBody => true,
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::UntilClose(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::UntilClose(decoder) => decoder.decode_eof(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
            Kind::Length(decoder) => {
                if let item @ Some(_) = decoder.decode(src)? {
                    return Ok(item);
                }
                Err(ParseError::invalid_body("connection closed inside a length-delimited body"))
            }
            Kind::Chunked(decoder) => {
                if let item @ Some(_) = decoder.decode(src)? {
                    return Ok(item);
                }
                Err(ParseError::invalid_body("connection closed inside a chunked body"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> DecodeLimits {
        DecodeLimits::default()
    }

    #[test]
    fn no_body_yields_eof_immediately() {
        let mut decoder = PayloadDecoder::new(PayloadSize::Empty, &limits());
        let mut buffer = BytesMut::new();
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.is_empty());
    }

    #[test]
    fn eof_inside_length_body_is_an_error() {
        let mut decoder = PayloadDecoder::new(PayloadSize::Length(10), &limits());
        let mut buffer = BytesMut::from(&b"abc"[..]);

        let item = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert!(decoder.decode_eof(&mut buffer).is_err());
    }

    #[test]
    fn eof_inside_chunked_body_is_an_error() {
        let mut decoder = PayloadDecoder::new(PayloadSize::Chunked, &limits());
        let mut buffer = BytesMut::from(&b"5\r\nab"[..]);

        // the partial chunk data comes out first
        let item = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert!(decoder.decode_eof(&mut buffer).is_err());
    }

    #[test]
    fn until_close_ends_cleanly_on_eof() {
        let mut decoder = PayloadDecoder::new(PayloadSize::UntilClose, &limits());
        let mut buffer = BytesMut::from(&b"tail"[..]);

        let item = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b"tail");
        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.can_end());
    }
}
