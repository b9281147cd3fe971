//! Response head types.
//!
//! The write path deals in [`ResponseHead`], a bare `http::Response<()>`
//! produced by handlers. The client read path produces [`ResponseHeader`],
//! which additionally keeps the reason phrase exactly as the peer sent it
//! (`http::StatusCode` only knows the canonical phrases).

use crate::protocol::request::content_type_of;
use crate::protocol::ConnectionOptions;
use http::{HeaderMap, Response, StatusCode, Version};
use mime::Mime;

/// The head of an outgoing response.
pub type ResponseHead = Response<()>;

/// The head of a decoded response, as received by the client.
#[derive(Debug)]
pub struct ResponseHeader {
    head: ResponseHead,
    reason: Option<String>,
}

impl ResponseHeader {
    pub(crate) fn new(head: ResponseHead, reason: Option<String>) -> Self {
        Self { head, reason }
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    /// The reason phrase as sent on the wire, falling back to the canonical
    /// phrase when the peer sent the expected one.
    pub fn reason_phrase(&self) -> &str {
        match &self.reason {
            Some(reason) => reason.as_str(),
            None => self.head.status().canonical_reason().unwrap_or(""),
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::from_headers(self.headers())
    }

    pub fn content_type(&self) -> Option<Mime> {
        content_type_of(self.headers())
    }

    pub fn into_head(self) -> ResponseHead {
        self.head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_reason_fallback() {
        let head = Response::builder().status(StatusCode::NOT_FOUND).body(()).unwrap();
        let header = ResponseHeader::new(head, None);
        assert_eq!(header.reason_phrase(), "Not Found");
    }

    #[test]
    fn wire_reason_preserved() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let header = ResponseHeader::new(head, Some("Okey Dokey".to_string()));
        assert_eq!(header.reason_phrase(), "Okey Dokey");
    }
}
