//! Decoder for chunked transfer encoding (RFC 7230 §4.1).

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, Bytes, BytesMut};
use std::task::Poll;
use tracing::trace;
use ChunkedState::*;

/// Byte-at-a-time state machine over the chunked format: hex size line
/// (with optional extensions), data, CRLF, repeated until the zero chunk,
/// then an optional trailer section and the final CRLF.
///
/// The size accumulator is checked against the configured chunk cap after
/// every digit, so an attacker cannot make the decoder commit to an
/// oversized chunk before the limit fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    max_chunk_length: u64,
}

impl ChunkedDecoder {
    pub fn new(max_chunk_length: u64) -> Self {
        Self { state: Size, remaining_size: 0, max_chunk_length }
    }

    /// True once the final CRLF of the terminating chunk was consumed.
    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        loop {
            if self.state == End {
                trace!("finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut chunk = None;
            self.state = match self.state.step(src, &mut self.remaining_size, &mut chunk) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(next)) => next,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if self.state == Size || self.state == SizeLws || self.state == Extension {
                if self.remaining_size > self.max_chunk_length {
                    return Err(ParseError::ChunkTooLarge { length: self.remaining_size, max: self.max_chunk_length });
                }
            }

            if let Some(bytes) = chunk {
                trace!(len = bytes.len(), "read chunk bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Hex digits of the chunk size
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Chunk extension, ignored up to CRLF
    Extension,
    /// LF closing the size line
    SizeLf,
    /// Chunk data
    Body,
    /// CR after the data
    BodyCr,
    /// LF after the data
    BodyLf,
    /// A trailer field, ignored up to CRLF
    Trailer,
    /// LF closing a trailer field
    TrailerLf,
    /// CR of the final empty line
    EndCr,
    /// LF of the final empty line
    EndLf,
    /// Terminator consumed
    End,
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.len() > 0 {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

impl ChunkedState {
    fn step(
        &self,
        src: &mut BytesMut,
        remaining_size: &mut u64,
        chunk: &mut Option<Bytes>,
    ) -> Poll<Result<ChunkedState, ParseError>> {
        match self {
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, chunk),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailer => ChunkedState::read_trailer(src),
            TrailerLf => ChunkedState::read_trailer_lf(src),
            EndCr => ChunkedState::read_end_cr(src),
            EndLf => ChunkedState::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    fn read_size(src: &mut BytesMut, size: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(value) => value,
                    None => {
                        return Poll::Ready(Err(ParseError::invalid_body("chunk size overflows")));
                    }
                }
            };
        }

        let radix = 16;
        match try_next_byte!(src) {
            b @ b'0'..=b'9' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b - b'0') as u64));
            }
            b @ b'a'..=b'f' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b + 10 - b'a') as u64));
            }
            b @ b'A'..=b'F' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b + 10 - b'A') as u64));
            }
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            byte => {
                return Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunk size" }));
            }
        }

        Poll::Ready(Ok(Size))
    }

    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        // whitespace may follow the size, but no further digits
        match try_next_byte!(src) {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunk size whitespace" })),
        }
    }

    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        // extensions are ignored; they end at CRLF, and a bare LF is
        // rejected so sloppy peers cannot smuggle one past us
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_body("bare newline inside a chunk extension"))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size: &mut u64) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => {
                if *size == 0 {
                    Poll::Ready(Ok(EndCr))
                } else {
                    Poll::Ready(Ok(Body))
                }
            }
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunk size line end" })),
        }
    }

    fn read_body(src: &mut BytesMut, size: &mut u64, chunk: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        let remaining = match *size {
            r if r > usize::MAX as u64 => usize::MAX,
            r => r as usize,
        };
        let read_size = std::cmp::min(remaining, src.len());

        *size -= read_size as u64;
        *chunk = Some(src.split_to(read_size).freeze());

        if *size > 0 {
            Poll::Ready(Ok(Body))
        } else {
            Poll::Ready(Ok(BodyCr))
        }
    }

    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunk data end" })),
        }
    }

    fn read_body_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(Size)),
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunk data end" })),
        }
    }

    fn read_trailer(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "trailer line end" })),
        }
    }

    fn read_end_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            byte => Poll::Ready(Err(ParseError::InvalidCharacter { byte, context: "chunked body end" })),
        }
    }
}
