//! The frame relay between the connection's framed reader and a handler.
//!
//! The handler future and the connection loop both need the framed reader:
//! the handler to pull body frames, the connection to notice protocol
//! errors. They are bridged with a pair of bounded channels; the handler
//! side ([`FrameReceiver`]) sends a pull signal and awaits a frame, the
//! connection side ([`BodyRelay`]) reads one payload frame per signal.
//! The connection drives `BodyRelay::run` concurrently with the handler
//! and calls [`BodyRelay::skip`] afterwards, so an unconsumed body never
//! poisons the next pipelined request.

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::Bytes;
use futures::{channel::mpsc, Sink, SinkExt, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::error;

pub(crate) fn relay<S>(frames: &mut S, payload_size: PayloadSize) -> (BodyRelay<'_, S>, FrameReceiver)
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    let (signal_sender, signal_receiver) = mpsc::channel(8);
    let (frame_sender, frame_receiver) = mpsc::channel(8);

    (
        BodyRelay { frames, signal_receiver, frame_sender, eof: false },
        FrameReceiver { signal_sender, frame_receiver, payload_size, in_flight: false },
    )
}

pub(crate) enum PullSignal {
    More,
    #[allow(dead_code)]
    Enough,
}

/// Connection-side half of the body channel. Holds the framed reader for
/// the lifetime of one request.
pub struct BodyRelay<'conn, S> {
    frames: &'conn mut S,
    signal_receiver: mpsc::Receiver<PullSignal>,
    frame_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    eof: bool,
}

impl<'conn, S> BodyRelay<'conn, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Serves pull signals until the body ends or the receiver goes away.
    pub async fn run(&mut self) -> Result<(), ParseError> {
        if self.eof {
            return Ok(());
        }

        while let Some(signal) = self.signal_receiver.next().await {
            match signal {
                PullSignal::More => match self.read_frame().await {
                    Ok(item) => {
                        self.eof = item.is_eof();
                        if let Err(e) = self.frame_sender.send(Ok(item)).await {
                            error!("failed to forward body frame: {}", e);
                            return Err(ParseError::invalid_body("body channel broken"));
                        }
                        if self.eof {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        error!("failed to read body frame: {}", e);
                        if let Err(send_error) = self.frame_sender.send(Err(e)).await {
                            error!("failed to forward body error: {}", send_error);
                            return Err(ParseError::invalid_body("body channel broken"));
                        }
                        break;
                    }
                },

                PullSignal::Enough => break,
            }
        }

        self.skip().await
    }

    async fn read_frame(&mut self) -> Result<PayloadItem, ParseError> {
        match self.frames.next().await {
            Some(Ok(Message::Payload(item))) => Ok(item),
            Some(Ok(Message::Header(_))) => {
                error!("received a message head while relaying a body");
                Err(ParseError::invalid_body("head frame inside a body"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::invalid_body("connection closed inside a body")),
        }
    }

    /// Drains whatever the handler left unread.
    pub async fn skip(&mut self) -> Result<(), ParseError> {
        if self.eof {
            return Ok(());
        }

        loop {
            match self.read_frame().await {
                Ok(item) if item.is_eof() => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(_item) => {}
                Err(e) => return Err(e),
            }
        }
    }
}

/// Handler-side half of the body channel; a pull-based `Body`.
#[derive(Debug)]
pub(crate) struct FrameReceiver {
    signal_sender: mpsc::Sender<PullSignal>,
    frame_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
    payload_size: PayloadSize,
    in_flight: bool,
}

impl Body for FrameReceiver {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Err(e) = Pin::new(&mut this.signal_sender).start_send(PullSignal::More) {
                        error!("failed to signal for a body frame: {}", e);
                        return Poll::Ready(Some(Err(ParseError::invalid_body("body channel broken"))));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(e)) => {
                    error!("body signal channel unavailable: {}", e);
                    return Poll::Ready(Some(Err(ParseError::invalid_body("body channel broken"))));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.frame_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.in_flight = false;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.in_flight = false;
                Poll::Ready(Some(Err(ParseError::invalid_body("body channel closed mid-stream"))))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        false
    }

    fn size_hint(&self) -> SizeHint {
        match self.payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Empty => SizeHint::with_exact(0),
            PayloadSize::Chunked | PayloadSize::UntilClose => SizeHint::new(),
        }
    }
}
