//! Per-request bookkeeping for in-flight tracking and observability.

use http::{Method, StatusCode, Version};
use std::time::SystemTime;

/// Metadata about one request on a connection.
///
/// The server pushes one of these when a request head arrives and pops it
/// once the response is on the wire; the client pushes on send and pops
/// when the matching response (FIFO order) is decoded. The response status
/// is filled in as soon as it is known.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    version: Version,
    method: Method,
    uri: String,
    issued_at: SystemTime,
    status: Option<StatusCode>,
}

impl RequestInfo {
    pub fn new(version: Version, method: Method, uri: String) -> Self {
        Self { version, method, uri, issued_at: SystemTime::now(), status: None }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    /// The response status, once one has been produced.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}
