//! Incremental HTTP/1.x codecs.
//!
//! Each decoder is a `tokio_util::codec::Decoder`: it consumes what it can
//! from the read buffer and returns `Ok(None)` when more input is needed,
//! `Ok(Some(_))` when a frame is complete, or a [`ParseError`] carrying
//! the status code to answer with. No byte is consumed past the last
//! cleanly parsed token. Encoders mirror the same split: a head encoder
//! writes the start line and header section, a payload encoder frames the
//! body.
//!
//! Four coordinators pair a head codec with a payload codec:
//!
//! - [`RequestDecoder`] / [`ResponseEncoder`] for the server side
//! - [`RequestEncoder`] / [`ResponseDecoder`] for the client side
//!
//! [`ParseError`]: crate::protocol::ParseError

pub mod body;
pub mod header;

mod request_decoder;
pub use request_decoder::RequestDecoder;

mod response_encoder;
pub use response_encoder::ResponseEncoder;

mod request_encoder;
pub use request_encoder::RequestEncoder;

mod response_decoder;
pub use response_decoder::ResponseDecoder;
