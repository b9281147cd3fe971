//! Head encoders: start line plus header section.
//!
//! The framing header (`Content-Length` or `Transfer-Encoding: chunked`)
//! is derived from the [`PayloadSize`] accompanying the head, overriding
//! whatever the caller may have put there, so the header section can never
//! contradict the body actually written.

use crate::protocol::{PayloadSize, ResponseHead, SendError};
use bytes::{BufMut, BytesMut};
use http::{header, HeaderValue, Request, Version};
use tokio_util::codec::Encoder;
use tracing::error;

const INIT_HEAD_SIZE: usize = 4 * 1024;

/// Encoder for the head of an outgoing response.
pub struct ResponseHeadEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for ResponseHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEAD_SIZE);
        write_version(head.version(), dst)?;
        dst.put_slice(head.status().as_str().as_bytes());
        dst.put_slice(b" ");
        dst.put_slice(head.status().canonical_reason().unwrap_or("Unknown").as_bytes());
        dst.put_slice(b"\r\n");

        set_framing_header(head.headers_mut(), payload_size, true)?;

        for (name, value) in head.headers().iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Encoder for the head of an outgoing request.
pub struct RequestHeadEncoder;

impl Encoder<(Request<()>, PayloadSize)> for RequestHeadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (Request<()>, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEAD_SIZE);
        dst.put_slice(head.method().as_str().as_bytes());
        dst.put_slice(b" ");
        let target = head.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        dst.put_slice(target.as_bytes());
        dst.put_slice(b" ");
        write_version_line_tail(head.version(), dst)?;

        // the request line carries only path and query, so the authority
        // moves into a Host header unless the caller already set one
        if !head.headers().contains_key(header::HOST) {
            if let Some(authority) = head.uri().authority() {
                let value = HeaderValue::from_str(authority.as_str())
                    .map_err(|e| SendError::invalid_body(format!("invalid authority for host header: {e}")))?;
                head.headers_mut().insert(header::HOST, value);
            }
        }

        set_framing_header(head.headers_mut(), payload_size, false)?;

        for (name, value) in head.headers().iter() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn write_version(version: Version, dst: &mut BytesMut) -> Result<(), SendError> {
    match version {
        Version::HTTP_10 => dst.put_slice(b"HTTP/1.0 "),
        Version::HTTP_11 => dst.put_slice(b"HTTP/1.1 "),
        v => {
            error!(http_version = ?v, "cannot encode this http version");
            return Err(SendError::invalid_body(format!("unencodable http version {v:?}")));
        }
    }
    Ok(())
}

fn write_version_line_tail(version: Version, dst: &mut BytesMut) -> Result<(), SendError> {
    match version {
        Version::HTTP_10 => dst.put_slice(b"HTTP/1.0\r\n"),
        Version::HTTP_11 => dst.put_slice(b"HTTP/1.1\r\n"),
        v => {
            error!(http_version = ?v, "cannot encode this http version");
            return Err(SendError::invalid_body(format!("unencodable http version {v:?}")));
        }
    }
    Ok(())
}

fn set_framing_header(
    headers: &mut http::HeaderMap,
    payload_size: PayloadSize,
    explicit_empty: bool,
) -> Result<(), SendError> {
    match payload_size {
        PayloadSize::Length(n) => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(n));
        }
        PayloadSize::Chunked => {
            headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }
        PayloadSize::Empty => {
            // responses advertise the empty body; bodiless requests
            // simply omit the header
            if explicit_empty {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(0u64));
            }
        }
        PayloadSize::UntilClose => {
            return Err(SendError::invalid_body("refusing to send a message without explicit framing"));
        }
    }
    Ok(())
}
