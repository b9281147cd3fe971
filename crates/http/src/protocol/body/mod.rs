//! Lazy request bodies.
//!
//! The connection driver does not read a request body ahead of the
//! handler. Instead the handler receives a [`ReqBody`] whose frames are
//! pulled, on demand, from the connection's framed reader by a
//! [`BodyRelay`] running alongside the handler future. A body the handler
//! never consumes is drained by the relay afterwards so the next
//! pipelined request starts at a clean frame boundary.

mod channel;

use channel::{relay, FrameReceiver};
pub use channel::BodyRelay;

use crate::protocol::{Message, ParseError, PayloadSize, RequestHeader};
use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The body of an incoming request, consumed as an `http_body::Body`.
pub struct ReqBody {
    inner: ReqBodyRepr,
}

enum ReqBodyRepr {
    Receiver(FrameReceiver),
    NoBody,
}

impl ReqBody {
    /// Splits a framed reader into a lazy body for the handler and the
    /// relay the connection must drive while the handler runs. Bodiless
    /// requests need no relay.
    pub(crate) fn channel<S>(frames: &mut S, payload_size: PayloadSize) -> (ReqBody, Option<BodyRelay<'_, S>>)
    where
        S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    {
        match payload_size {
            PayloadSize::Empty | PayloadSize::Length(0) => (ReqBody::no_body(), None),
            _ => {
                let (relay, receiver) = relay(frames, payload_size);
                (ReqBody { inner: ReqBodyRepr::Receiver(receiver) }, Some(relay))
            }
        }
    }

    pub fn no_body() -> Self {
        Self { inner: ReqBodyRepr::NoBody }
    }

    /// Buffers the whole body, failing with a 413-mapped error once more
    /// than `limit` bytes have accumulated.
    pub async fn buffer(mut self, limit: u64) -> Result<Bytes, ParseError> {
        let mut collected = BytesMut::new();
        while let Some(frame) = self.frame().await {
            let frame = frame?;
            if let Ok(data) = frame.into_data() {
                if collected.len() as u64 + data.len() as u64 > limit {
                    return Err(ParseError::ContentTooLarge {
                        length: collected.len() as u64 + data.len() as u64,
                        max: limit,
                    });
                }
                collected.put(data);
            }
        }
        Ok(collected.freeze())
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.inner {
            ReqBodyRepr::Receiver(receiver) => Pin::new(receiver).poll_frame(cx),
            ReqBodyRepr::NoBody => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            ReqBodyRepr::NoBody => true,
            ReqBodyRepr::Receiver(receiver) => receiver.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            ReqBodyRepr::NoBody => SizeHint::with_exact(0),
            ReqBodyRepr::Receiver(receiver) => receiver.size_hint(),
        }
    }
}
