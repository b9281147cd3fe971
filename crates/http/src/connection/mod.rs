//! Server-side connection handling.
//!
//! [`HttpConnection`] owns one accepted stream and drives it through its
//! whole lifecycle: decoding pipelined requests in arrival order,
//! expect-continue, the idle timeout, per-response keep-alive decisions
//! and the final half-close.

mod http_connection;

pub use http_connection::HttpConnection;
