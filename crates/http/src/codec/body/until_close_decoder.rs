//! Decoder for response bodies delimited by connection close.
//!
//! Used when a response carries neither `Content-Length` nor a recognized
//! `Transfer-Encoding`: everything up to EOF is body. The end of the body
//! can only be observed through `decode_eof`, which the coordinator
//! forwards when the transport reports end of stream.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UntilCloseDecoder {
    finished: bool,
}

impl UntilCloseDecoder {
    pub fn new() -> Self {
        Self { finished: false }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        if self.finished {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let bytes = src.split_to(src.len()).freeze();
        Ok(Some(PayloadItem::Chunk(bytes)))
    }

    pub fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        if !src.is_empty() {
            return self.decode(src);
        }
        if self.finished {
            return Ok(None);
        }
        self.finished = true;
        Ok(Some(PayloadItem::Eof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_everything_then_ends_on_eof() {
        let mut decoder = UntilCloseDecoder::new();
        let mut buffer = BytesMut::from(&b"partial"[..]);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b"partial");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b" more");
        let item = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap().as_ref(), b" more");

        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.is_finished());
        assert!(decoder.decode_eof(&mut buffer).unwrap().is_none());
    }
}
