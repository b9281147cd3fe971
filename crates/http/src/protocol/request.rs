//! Request head type and the facts derived from its headers.

use crate::protocol::{ConnectionOptions, ParseError, QueryParams, Ranges};
use http::header::{EXPECT, RANGE};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use mime::Mime;

/// The head of an HTTP request: method, target, version and header fields.
///
/// Wraps `http::Request<()>` and adds the header-derived accessors the
/// connection layer and handlers need: connection options, the
/// expect-continue flag, parsed `Range` and `Content-Type`, decoded query
/// parameters.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, turning the head into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Options carried by the `Connection` header.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::from_headers(self.headers())
    }

    /// True when the client sent `Expect: 100-continue` and is waiting for
    /// an interim response before transmitting the body.
    pub fn expects_100_continue(&self) -> bool {
        match self.headers().get(EXPECT) {
            Some(value) => {
                let slice = value.as_bytes();
                slice.len() >= 4 && slice[0..4].eq_ignore_ascii_case(b"100-")
            }
            None => false,
        }
    }

    /// The parsed `Content-Type`, if one is present and well-formed.
    pub fn content_type(&self) -> Option<Mime> {
        content_type_of(self.headers())
    }

    /// The parsed `Range` header. A malformed value is treated as if no
    /// range had been requested.
    pub fn ranges(&self) -> Option<Ranges> {
        let value = self.headers().get(RANGE)?.to_str().ok()?;
        Ranges::parse(value).ok()
    }

    /// Decoded query parameters of the request-target.
    pub fn query_params(&self) -> Result<QueryParams, ParseError> {
        QueryParams::from_uri(self.uri())
    }
}

pub(crate) fn content_type_of(headers: &HeaderMap) -> Option<Mime> {
    headers.get(http::header::CONTENT_TYPE)?.to_str().ok()?.parse::<Mime>().ok()
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(builder: http::request::Builder) -> RequestHeader {
        builder.body(()).unwrap().into()
    }

    #[test]
    fn expect_continue_flag() {
        let request = header(Request::builder().method(Method::POST).uri("/u").header(EXPECT, "100-continue"));
        assert!(request.expects_100_continue());

        let request = header(Request::builder().method(Method::POST).uri("/u"));
        assert!(!request.expects_100_continue());
    }

    #[test]
    fn content_type_parsing() {
        let request = header(Request::builder().uri("/").header("content-type", "text/plain; charset=utf-8"));
        let mime = request.content_type().unwrap();
        assert_eq!(mime.type_(), mime::TEXT);
        assert_eq!(mime.subtype(), mime::PLAIN);
        assert_eq!(mime.get_param(mime::CHARSET).unwrap(), mime::UTF_8);
    }

    #[test]
    fn range_header() {
        let request = header(Request::builder().uri("/f").header(RANGE, "bytes=0-99"));
        let ranges = request.ranges().unwrap();
        assert_eq!(ranges.simplify(1000), vec![(0, 100)]);

        let request = header(Request::builder().uri("/f").header(RANGE, "pages=1-2"));
        assert!(request.ranges().is_none());
    }

    #[test]
    fn query_params_from_target() {
        let request = header(Request::builder().uri("/index/?a=1&b=2&a=3"));
        let params = request.query_params().unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("b"), Some("2"));
    }
}
