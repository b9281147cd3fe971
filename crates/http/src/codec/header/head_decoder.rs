//! Head decoders: request line / status line plus the header section.
//!
//! Tokenization is `httparse`'s (which also rejects obs-fold continuation
//! lines and control bytes); this module layers the configured limits on
//! top and performs the header post-processing that decides body framing:
//! `Host` presence, `Content-Length`/`Transfer-Encoding` exclusivity,
//! transfer-coding recognition and the content-length cap.

use std::mem::MaybeUninit;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::config::DecodeLimits;
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, ResponseHeader};

pub(crate) const MAX_HEADER_NUM: usize = 64;

/// Decoder for a request head. Emits the parsed head together with the
/// body framing derived from it.
pub struct RequestHeadDecoder {
    limits: DecodeLimits,
}

impl RequestHeadDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits }
    }
}

impl Decoder for RequestHeadDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] = unsafe { MaybeUninit::uninit().assume_init() };

        let parsed = req.parse_with_uninit_headers(src, &mut headers).map_err(map_httparse_error)?;

        match parsed {
            Status::Complete(head_len) => {
                trace!(head_len, "parsed request head");

                // target length first, so an oversized target answers 414
                // even when something later in the head is also wrong
                let path = req.path.ok_or_else(|| ParseError::invalid_start_line("missing request target"))?;
                ensure!(
                    path.len() <= self.limits.max_request_uri_length,
                    ParseError::UriTooLong { length: path.len(), max: self.limits.max_request_uri_length }
                );
                ensure!(
                    head_len <= self.limits.max_head_length(),
                    ParseError::HeaderSectionTooLarge { size: head_len, max: self.limits.max_head_length() }
                );

                let version = match req.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    v => return Err(ParseError::UnsupportedVersion(v)),
                };

                check_field_limits(req.headers, &self.limits)?;

                let method = req.method.ok_or_else(|| ParseError::invalid_start_line("missing method"))?;
                let mut builder = Request::builder().method(method).uri(path).version(version);

                let header_count = req.headers.len();
                let mut indices = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];
                HeaderIndex::record(src, req.headers, &mut indices);

                let header_bytes = src.split_to(head_len).freeze();

                // headers_mut is None exactly when the builder already
                // holds a start-line error, which body() then surfaces
                if let Some(headers) = builder.headers_mut() {
                    append_headers(headers, &header_bytes, &indices[..header_count])?;
                }

                let head = builder.body(()).map_err(|e| ParseError::invalid_start_line(e.to_string()))?;
                let header = RequestHeader::from(head);

                if header.version() == Version::HTTP_11 && !header.headers().contains_key(http::header::HOST) {
                    return Err(ParseError::MissingHost);
                }

                let payload_size = request_payload_size(header.headers(), &self.limits)?;
                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(
                    src.len() <= self.limits.max_head_length(),
                    ParseError::HeaderSectionTooLarge { size: src.len(), max: self.limits.max_head_length() }
                );
                Ok(None)
            }
        }
    }
}

/// Decoder for a response head.
///
/// Body framing of a response depends on the request that elicited it:
/// the caller flags responses to `HEAD` requests via
/// [`set_head_request`](Self::set_head_request) before decoding.
pub struct ResponseHeadDecoder {
    limits: DecodeLimits,
    head_request: bool,
}

impl ResponseHeadDecoder {
    pub fn new(limits: DecodeLimits) -> Self {
        Self { limits, head_request: false }
    }

    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }
}

impl Decoder for ResponseHeadDecoder {
    type Item = (ResponseHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut resp = httparse::Response::new(&mut headers);

        let parsed = resp.parse(src).map_err(map_httparse_error)?;

        match parsed {
            Status::Complete(head_len) => {
                trace!(head_len, "parsed response head");
                ensure!(
                    head_len <= self.limits.max_head_length(),
                    ParseError::HeaderSectionTooLarge { size: head_len, max: self.limits.max_head_length() }
                );

                let version = match resp.version {
                    Some(0) => Version::HTTP_10,
                    Some(1) => Version::HTTP_11,
                    v => return Err(ParseError::UnsupportedVersion(v)),
                };

                let code = resp.code.ok_or_else(|| ParseError::invalid_start_line("missing status code"))?;
                let status = StatusCode::from_u16(code)
                    .map_err(|_| ParseError::invalid_start_line(format!("invalid status code {code}")))?;

                let reason = match resp.reason {
                    Some(reason) => {
                        ensure!(
                            reason.len() <= self.limits.max_reason_phrase_length,
                            ParseError::invalid_start_line(format!(
                                "reason phrase of {} bytes exceeds the limit {}",
                                reason.len(),
                                self.limits.max_reason_phrase_length
                            ))
                        );
                        match status.canonical_reason() {
                            Some(canonical) if canonical == reason => None,
                            _ => Some(reason.to_string()),
                        }
                    }
                    None => None,
                };

                check_field_limits(resp.headers, &self.limits)?;

                let mut builder = Response::builder().status(status).version(version);

                let header_count = resp.headers.len();
                let mut indices = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];
                HeaderIndex::record(src, resp.headers, &mut indices);

                let header_bytes = src.split_to(head_len).freeze();

                if let Some(headers) = builder.headers_mut() {
                    append_headers(headers, &header_bytes, &indices[..header_count])?;
                }

                let head = builder.body(()).map_err(|e| ParseError::invalid_start_line(e.to_string()))?;
                let payload_size = response_payload_size(status, self.head_request, head.headers(), &self.limits)?;

                Ok(Some((ResponseHeader::new(head, reason), payload_size)))
            }
            Status::Partial => {
                ensure!(
                    src.len() <= self.limits.max_head_length(),
                    ParseError::HeaderSectionTooLarge { size: src.len(), max: self.limits.max_head_length() }
                );
                Ok(None)
            }
        }
    }
}

fn map_httparse_error(e: httparse::Error) -> ParseError {
    match e {
        httparse::Error::TooManyHeaders => ParseError::TooManyHeaders { max: MAX_HEADER_NUM },
        httparse::Error::Version => ParseError::UnsupportedVersion(None),
        httparse::Error::Token => ParseError::invalid_start_line("illegal token character"),
        e => ParseError::invalid_header(e.to_string()),
    }
}

fn check_field_limits(headers: &[httparse::Header<'_>], limits: &DecodeLimits) -> Result<(), ParseError> {
    for header in headers {
        ensure!(
            header.name.len() <= limits.max_header_name_length,
            ParseError::HeaderNameTooLong { length: header.name.len(), max: limits.max_header_name_length }
        );
        ensure!(
            header.value.len() <= limits.max_header_value_length,
            ParseError::HeaderValueTooLong { length: header.value.len(), max: limits.max_header_value_length }
        );
    }
    Ok(())
}

fn append_headers(headers: &mut HeaderMap, header_bytes: &Bytes, indices: &[HeaderIndex]) -> Result<(), ParseError> {
    headers.reserve(indices.len());
    for index in indices {
        // httparse has already vetted both slices, so failures here would
        // indicate an indexing bug rather than bad input
        let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;
        let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
            .map_err(|e| ParseError::invalid_header(e.to_string()))?;
        headers.append(name, value);
    }
    Ok(())
}

/// Byte offsets of one header field inside the frozen head, so names and
/// values can alias the original buffer instead of being copied.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

impl HeaderIndex {
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Body framing of a request, per RFC 7230 §3.3 plus the configured caps.
fn request_payload_size(headers: &HeaderMap, limits: &DecodeLimits) -> Result<PayloadSize, ParseError> {
    let has_te = headers.contains_key(http::header::TRANSFER_ENCODING);
    let has_cl = headers.contains_key(http::header::CONTENT_LENGTH);

    if has_te && has_cl {
        return Err(ParseError::ContentLengthConflict);
    }

    if has_te {
        transfer_encoding_is_chunked(headers)?;
        return Ok(PayloadSize::Chunked);
    }

    if has_cl {
        let length = parse_content_length(headers)?;
        ensure!(
            length <= limits.max_content_length,
            ParseError::ContentTooLarge { length, max: limits.max_content_length }
        );
        return Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) });
    }

    Ok(PayloadSize::Empty)
}

/// Body framing of a response. A response with neither `Content-Length`
/// nor `Transfer-Encoding` (and a status that permits a body) runs until
/// the peer closes the connection.
fn response_payload_size(
    status: StatusCode,
    head_request: bool,
    headers: &HeaderMap,
    limits: &DecodeLimits,
) -> Result<PayloadSize, ParseError> {
    if head_request
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(PayloadSize::Empty);
    }

    let has_te = headers.contains_key(http::header::TRANSFER_ENCODING);
    let has_cl = headers.contains_key(http::header::CONTENT_LENGTH);

    if has_te && has_cl {
        return Err(ParseError::ContentLengthConflict);
    }

    if has_te {
        transfer_encoding_is_chunked(headers)?;
        return Ok(PayloadSize::Chunked);
    }

    if has_cl {
        let length = parse_content_length(headers)?;
        ensure!(
            length <= limits.max_content_length,
            ParseError::ContentTooLarge { length, max: limits.max_content_length }
        );
        return Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) });
    }

    Ok(PayloadSize::UntilClose)
}

/// Only the `chunked` coding is recognized; anything else in the
/// `Transfer-Encoding` list answers 501.
fn transfer_encoding_is_chunked(headers: &HeaderMap) -> Result<(), ParseError> {
    let mut tokens = Vec::new();
    for value in headers.get_all(http::header::TRANSFER_ENCODING) {
        let value = value
            .to_str()
            .map_err(|_| ParseError::invalid_header("transfer-encoding value is not visible ascii"))?;
        tokens.extend(value.split(',').map(str::trim).filter(|t| !t.is_empty()));
    }

    match tokens.as_slice() {
        [token] if token.eq_ignore_ascii_case("chunked") => Ok(()),
        [] => Err(ParseError::invalid_header("empty transfer-encoding")),
        tokens => {
            let coding = tokens.iter().find(|t| !t.eq_ignore_ascii_case("chunked")).unwrap_or(&tokens[0]);
            Err(ParseError::UnsupportedTransferEncoding { coding: coding.to_string() })
        }
    }
}

fn parse_content_length(headers: &HeaderMap) -> Result<u64, ParseError> {
    let mut parsed: Option<u64> = None;
    for value in headers.get_all(http::header::CONTENT_LENGTH) {
        let value = value.to_str().map_err(|_| ParseError::invalid_content_length("value is not visible ascii"))?;
        let length = value
            .trim()
            .parse::<u64>()
            .map_err(|_| ParseError::invalid_content_length(format!("value '{value}' is not a length")))?;
        match parsed {
            Some(previous) if previous != length => {
                return Err(ParseError::invalid_content_length("conflicting duplicate values"));
            }
            _ => parsed = Some(length),
        }
    }
    parsed.ok_or_else(|| ParseError::invalid_content_length("missing value"))
}
