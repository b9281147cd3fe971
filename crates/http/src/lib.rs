//! Embeddable HTTP/1.x protocol core.
//!
//! This crate contains the pieces shared by the server and client sides of
//! the library:
//!
//! - [`codec`]: incremental decoders and encoders for HTTP/1.x messages,
//!   built on `tokio_util`'s codec traits. Partial input yields `Ok(None)`,
//!   a complete frame yields `Ok(Some(_))`, malformed input yields a typed
//!   error carrying the response status to send back.
//! - [`protocol`]: message model (heads, payload frames, framing sizes),
//!   header-derived facts (connection options, ranges, content types),
//!   request bodies and the error hierarchy.
//! - [`connection`]: the server-side connection driver: read loop, idle
//!   timeout, expect-continue, pipelining and keep-alive.
//! - [`client`]: the outbound side, pairing responses with the in-flight
//!   request queue.
//! - [`config`]: the configuration surface recognized by the whole library.
//!
//! The crate never talks to a poller directly; everything is generic over
//! `AsyncRead + AsyncWrite` streams so embedders can supply TCP sockets,
//! TLS sessions or in-memory pipes.

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
