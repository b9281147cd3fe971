//! Library configuration.
//!
//! One [`HttpConfig`] describes everything the core recognizes: bind
//! address, parser limits, body bufferization, the idle timeout, content
//! decoders and default response headers. Limits default to conservative
//! values; each field documents its own.
//!
//! Callbacks the embedder may want ([`Hooks`], [`ErrorSender`]) are
//! capability traits rather than function pointers with an opaque
//! argument: the receiver carries whatever state the embedder needs.

use crate::protocol::{form_decoder, ContentDecoder, RequestHeader, RequestInfo};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use mime::Mime;
use std::path::PathBuf;
use std::time::Duration;

/// How request bodies are delivered to handlers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Bufferization {
    /// Buffer whenever the body fits the effective content limit.
    #[default]
    Auto,
    /// Always buffer the whole body before invoking the handler.
    Buffer,
    /// Hand the handler the streaming body untouched.
    Stream,
}

/// The full configuration surface of the library.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host to bind (server) or connect to (client). Default `localhost`.
    pub host: String,
    /// Port to bind or connect to. Default `80`.
    pub port: u16,
    /// Listen backlog per listening socket. Default `5`.
    pub connection_backlog: u32,

    /// Whether connections are expected to arrive over TLS. The core never
    /// performs handshakes or record I/O itself; it only validates that
    /// certificate material is configured and leaves the stream wrapping
    /// to the embedder.
    pub use_tls: bool,
    pub tls_certificate: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub tls_ciphers: Option<String>,

    /// Longest accepted request-target, in bytes. Default 2048;
    /// violations answer 414.
    pub max_request_uri_length: usize,
    /// Longest accepted header field name. Default 128; violations 431.
    pub max_header_name_length: usize,
    /// Longest accepted header field value. Default 4096; violations 431.
    pub max_header_value_length: usize,
    /// Largest accepted message body. Default 16 MB; violations 413.
    pub max_content_length: u64,
    /// Largest accepted single chunk. Default 1 MB; violations 413.
    pub max_chunk_length: u64,
    /// Longest accepted reason phrase on decoded responses. Default 512.
    pub max_reason_phrase_length: usize,

    /// Body delivery policy. Default [`Bufferization::Auto`].
    pub bufferization: Bufferization,

    /// A connection idle longer than this is answered 408 and closed.
    /// Default 10 seconds.
    pub connection_timeout: Duration,

    content_decoders: Vec<ContentDecoder>,

    /// Headers merged into every response (added only when the response
    /// does not already carry the name).
    pub default_headers: HeaderMap,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 80,
            connection_backlog: 5,
            use_tls: false,
            tls_certificate: None,
            tls_key: None,
            tls_ciphers: None,
            max_request_uri_length: 2048,
            max_header_name_length: 128,
            max_header_value_length: 4096,
            max_content_length: 16_000_000,
            max_chunk_length: 1_000_000,
            max_reason_phrase_length: 512,
            bufferization: Bufferization::Auto,
            connection_timeout: Duration::from_millis(10_000),
            content_decoders: vec![form_decoder()],
            default_headers: HeaderMap::new(),
        }
    }
}

impl HttpConfig {
    /// Registers a content decoder. A decoder registered later for the
    /// same base media type shadows the earlier one.
    pub fn content_decoder_add(&mut self, decoder: ContentDecoder) {
        self.content_decoders.push(decoder);
    }

    /// Looks up the decoder for a base media type.
    pub fn content_decoder(&self, media_type: &Mime) -> Option<&ContentDecoder> {
        self.content_decoders.iter().rev().find(|d| d.matches(media_type))
    }

    /// Appends a default header, keeping any existing values.
    pub fn default_header_add(&mut self, name: HeaderName, value: HeaderValue) {
        self.default_headers.append(name, value);
    }

    /// Sets a default header, replacing any existing values.
    pub fn default_header_set(&mut self, name: HeaderName, value: HeaderValue) {
        self.default_headers.insert(name, value);
    }
}

/// The subset of the configuration the decoders need, copied out so a
/// codec does not drag the whole configuration around.
#[derive(Debug, Copy, Clone)]
pub struct DecodeLimits {
    pub max_request_uri_length: usize,
    pub max_header_name_length: usize,
    pub max_header_value_length: usize,
    pub max_content_length: u64,
    pub max_chunk_length: u64,
    pub max_reason_phrase_length: usize,
}

impl DecodeLimits {
    /// Upper bound for a whole header section, derived from the per-field
    /// limits. Input past this point without a complete head fails 431.
    pub fn max_head_length(&self) -> usize {
        const MAX_HEADER_NUM: usize = 64;
        self.max_request_uri_length + MAX_HEADER_NUM * (self.max_header_name_length + self.max_header_value_length + 4) + 128
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for DecodeLimits {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_request_uri_length: config.max_request_uri_length,
            max_header_name_length: config.max_header_name_length,
            max_header_value_length: config.max_header_value_length,
            max_content_length: config.max_content_length,
            max_chunk_length: config.max_chunk_length,
            max_reason_phrase_length: config.max_reason_phrase_length,
        }
    }
}

/// Observation callbacks a connection invokes as it works.
///
/// All methods default to no-ops; implement the ones of interest. The
/// library additionally emits `tracing` events, so most embedders never
/// need these.
pub trait Hooks: Send + Sync {
    /// A complete request head arrived, before routing.
    fn on_request_received(&self, _header: &RequestHeader) {}

    /// A request finished: the response is on the wire and the info
    /// carries its status.
    fn on_request_complete(&self, _info: &RequestInfo) {}

    /// A library-level failure on the connection.
    fn on_error(&self, _message: &str) {}

    /// Protocol trace suitable for debugging.
    fn on_trace(&self, _message: &str) {}
}

/// The hook set used when the embedder installs none.
#[derive(Debug, Default)]
pub struct NoHooks;

impl Hooks for NoHooks {}

/// Renders the body of library-generated error responses.
pub trait ErrorSender: Send + Sync {
    /// Produces extra headers and the body for an error response.
    fn render(&self, status: StatusCode, detail: Option<&str>) -> (HeaderMap, Bytes);
}

/// Default error renderer: a minimal HTML page naming the status.
#[derive(Debug, Default)]
pub struct HtmlErrorSender;

impl ErrorSender for HtmlErrorSender {
    fn render(&self, status: StatusCode, _detail: Option<&str>) -> (HeaderMap, Bytes) {
        let reason = status.canonical_reason().unwrap_or("");
        let body = format!("<h1>{} {}</h1>\n", status.as_u16(), reason);

        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        (headers, Bytes::from(body))
    }
}
