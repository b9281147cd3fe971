use bytes::{Buf, Bytes};

/// A single frame flowing through the codecs: either the head of a message
/// or a piece of its payload.
///
/// `T` is the head type ([`RequestHeader`](crate::protocol::RequestHeader)
/// paired with a [`PayloadSize`] on the server read path, a
/// [`ResponseHead`](crate::protocol::ResponseHead) pair on the write path),
/// `D` is the payload chunk type.
pub enum Message<T, D: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<D>),
}

/// One item of a message payload: a data chunk, or the end of the body.
///
/// `Eof` is emitted exactly once per message. For chunked bodies it is
/// produced after the zero-length chunk and its trailer section have been
/// consumed, so by the time a caller sees `Eof` the whole message, final
/// CRLF included, has left the read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<D: Buf = Bytes> {
    Chunk(D),
    Eof,
}

/// Body framing of a message, decided once the header section is complete.
///
/// Framing precedence follows RFC 7230 §3.3: a recognized
/// `Transfer-Encoding: chunked` wins over `Content-Length`; a request with
/// neither has an empty body; a response with neither (and a status that
/// permits a body) is framed by connection close.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Exactly this many payload bytes follow the header section.
    Length(u64),
    /// Chunked transfer encoding.
    Chunked,
    /// Response body delimited by the peer closing the connection.
    UntilClose,
    /// No body.
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }

    #[inline]
    pub fn is_until_close(&self) -> bool {
        matches!(self, PayloadSize::UntilClose)
    }

    /// The exact body length, when the framing pins one down.
    pub fn exact(&self) -> Option<u64> {
        match self {
            PayloadSize::Length(n) => Some(*n),
            PayloadSize::Empty => Some(0),
            PayloadSize::Chunked | PayloadSize::UntilClose => None,
        }
    }
}

impl<T, D: Buf> Message<T, D> {
    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    pub fn into_payload_item(self) -> Option<PayloadItem<D>> {
        match self {
            Message::Header(_) => None,
            Message::Payload(item) => Some(item),
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    /// Returns the contained bytes if this is a `Chunk`, `None` for `Eof`.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
