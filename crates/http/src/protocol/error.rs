//! Error types for HTTP protocol handling.
//!
//! [`HttpError`] is the boundary type: it wraps [`ParseError`] for the read
//! path and [`SendError`] for the write path. Every protocol violation in
//! `ParseError` knows the status code the peer should receive for it, via
//! [`ParseError::status`]; there is no library-global error state.

use http::StatusCode;
use std::io;
use thiserror::Error;

/// The top-level error type for connection processing.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Errors raised while reading and parsing a message.
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    /// Errors raised while encoding and writing a message.
    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Errors raised while parsing an HTTP/1.x message.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Request-target longer than the configured limit.
    #[error("request uri too long: {length} exceeds the limit {max}")]
    UriTooLong { length: usize, max: usize },

    /// A header field name longer than the configured limit.
    #[error("header name too long: {length} exceeds the limit {max}")]
    HeaderNameTooLong { length: usize, max: usize },

    /// A header field value longer than the configured limit.
    #[error("header value too long: {length} exceeds the limit {max}")]
    HeaderValueTooLong { length: usize, max: usize },

    /// The whole header section outgrew the derived cap.
    #[error("header section too large: {size} exceeds the limit {max}")]
    HeaderSectionTooLarge { size: usize, max: usize },

    /// More header fields than the decoder can index.
    #[error("header count exceeds the limit {max}")]
    TooManyHeaders { max: usize },

    /// Declared or accumulated body larger than the configured limit.
    #[error("content too large: {length} exceeds the limit {max}")]
    ContentTooLarge { length: u64, max: u64 },

    /// A single chunk larger than the configured limit.
    #[error("chunk too large: {length} exceeds the limit {max}")]
    ChunkTooLarge { length: u64, max: u64 },

    /// Malformed request line or status line.
    #[error("invalid start line: {reason}")]
    InvalidStartLine { reason: String },

    /// Malformed header field.
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    /// An illegal byte where a token was expected, with the offender noted.
    #[error("invalid character 0x{byte:02x} in {context}")]
    InvalidCharacter { byte: u8, context: &'static str },

    /// HTTP/1.1 request without a `Host` header.
    #[error("missing host header")]
    MissingHost,

    /// `Content-Length` and `Transfer-Encoding` both present.
    #[error("content-length conflicts with transfer-encoding")]
    ContentLengthConflict,

    /// Unparseable or contradictory `Content-Length` value.
    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    /// Body framing broken mid-stream.
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// A transfer coding other than `chunked`.
    #[error("unsupported transfer encoding: {coding}")]
    UnsupportedTransferEncoding { coding: String },

    /// An HTTP version this library does not speak.
    #[error("unsupported http version: {0:?}")]
    UnsupportedVersion(Option<u8>),

    /// I/O failure underneath the parser.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn invalid_start_line<S: ToString>(reason: S) -> Self {
        Self::InvalidStartLine { reason: reason.to_string() }
    }

    pub fn invalid_header<S: ToString>(reason: S) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(reason: S) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status code a peer should be answered with for this error.
    ///
    /// The mapping follows RFC 7230/7231 and the RFC 6585 additions:
    /// oversized request-target is 414, oversized header material is 431,
    /// oversized bodies and chunks are 413, unrecognized transfer codings
    /// are 501, unsupported versions are 505, everything else malformed is
    /// a plain 400. I/O failures have no meaningful wire answer and map to
    /// 500 for the rare case one is rendered.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::UriTooLong { .. } => StatusCode::URI_TOO_LONG,
            ParseError::HeaderNameTooLong { .. }
            | ParseError::HeaderValueTooLong { .. }
            | ParseError::HeaderSectionTooLarge { .. }
            | ParseError::TooManyHeaders { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            ParseError::ContentTooLarge { .. } | ParseError::ChunkTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ParseError::UnsupportedTransferEncoding { .. } => StatusCode::NOT_IMPLEMENTED,
            ParseError::UnsupportedVersion(_) => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
            ParseError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Errors raised while encoding and sending an HTTP message.
#[derive(Error, Debug)]
pub enum SendError {
    /// The body does not fit the declared framing.
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    /// I/O failure underneath the encoder.
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(reason: S) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ParseError::UriTooLong { length: 4096, max: 2048 }.status(), StatusCode::URI_TOO_LONG);
        assert_eq!(
            ParseError::HeaderValueTooLong { length: 8192, max: 4096 }.status(),
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        );
        assert_eq!(
            ParseError::ContentTooLarge { length: 17_000_000, max: 16_000_000 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(ParseError::ChunkTooLarge { length: 2_000_000, max: 1_000_000 }.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            ParseError::UnsupportedTransferEncoding { coding: "gzip".into() }.status(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(ParseError::UnsupportedVersion(Some(2)).status(), StatusCode::HTTP_VERSION_NOT_SUPPORTED);
        assert_eq!(ParseError::MissingHost.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ParseError::ContentLengthConflict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ParseError::InvalidCharacter { byte: b'~', context: "chunk size" }.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
