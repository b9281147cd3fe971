//! Request and response body types for the web layer.

use bytes::Bytes;
use futures::TryStreamExt;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::StreamBody;
use kiln_http::protocol::body::ReqBody;
use kiln_http::protocol::{HttpError, ParseError, SendError};
use std::io::SeekFrom;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// A one-shot slot holding the request body.
///
/// The dispatch pipeline and the handler both get a handle to the same
/// slot; whichever calls [`take`](Self::take) first claims the body, and
/// every later claim comes back empty. The slot is only ever locked for
/// the claim itself, never across an await, so a plain mutex suffices.
#[derive(Clone)]
pub struct OptionReqBody {
    slot: Arc<Mutex<Option<ReqBody>>>,
}

impl OptionReqBody {
    pub fn new(body: ReqBody) -> Self {
        Self { slot: Arc::new(Mutex::new(Some(body))) }
    }

    /// Claims the body. `None` once any handle already claimed it.
    pub fn take(&self) -> Option<ReqBody> {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take()
    }

    /// True once some handle claimed the body.
    pub fn is_consumed(&self) -> bool {
        match self.slot.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Claims the body and buffers it whole, failing once more than
    /// `limit` bytes have accumulated.
    pub async fn bytes_with_limit(&self, limit: u64) -> Result<Bytes, ParseError> {
        match self.take() {
            Some(body) => body.buffer(limit).await,
            None => Err(ParseError::invalid_body("request body was already claimed")),
        }
    }
}

/// The body of an outgoing response.
///
/// One tagged type covers every entry the write path knows: nothing, a
/// single buffer, a boxed stream, or a file region (a stream with a known
/// length, so it is framed by `Content-Length` rather than chunked).
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream { body: UnsyncBoxBody<Bytes, HttpError>, length: Option<u64> },
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        Self { inner: Kind::Once(Some(bytes)) }
    }

    /// A streaming body with no known length; framed as chunked.
    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes, Error = HttpError> + Send + 'static,
    {
        Self { inner: Kind::Stream { body: UnsyncBoxBody::new(body), length: None } }
    }

    /// A streaming body whose exact length is known up front; framed by
    /// `Content-Length`.
    pub fn sized_stream<B>(body: B, length: u64) -> Self
    where
        B: HttpBody<Data = Bytes, Error = HttpError> + Send + 'static,
    {
        Self { inner: Kind::Stream { body: UnsyncBoxBody::new(body), length: Some(length) } }
    }

    /// A region of an open file, streamed without loading it into memory.
    pub async fn file_region(mut file: tokio::fs::File, offset: u64, length: u64) -> std::io::Result<Self> {
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        let stream = ReaderStream::new(file.take(length))
            .map_ok(Frame::data)
            .map_err(|e| HttpError::from(SendError::io(e)));
        Ok(Self::sized_stream(StreamBody::new(stream), length))
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Self::empty()
        } else {
            Self::once(Bytes::from(value))
        }
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        if value.is_empty() {
            Self::empty()
        } else {
            Self::once(value.as_bytes().into())
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self::once(bytes)
        }
    }
}

impl From<()> for ResponseBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        match option {
            Some(bytes) => Self::from(bytes),
            None => Self::empty(),
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Once(bytes) if bytes.is_none() => Poll::Ready(None),
            Kind::Once(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes.take().expect("checked above"))))),
            Kind::Stream { body, .. } => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(bytes) => bytes.is_none(),
            Kind::Stream { body, .. } => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream { length: Some(length), .. } => SizeHint::with_exact(*length),
            Kind::Stream { body, .. } => body.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io;

    fn check_send<T: Send>() {}

    #[test]
    fn response_body_is_send() {
        check_send::<ResponseBody>();
    }

    #[tokio::test]
    async fn body_slot_is_claimed_once() {
        let body = OptionReqBody::new(ReqBody::no_body());
        let other_handle = body.clone();
        assert!(!body.is_consumed());

        assert!(body.bytes_with_limit(16).await.unwrap().is_empty());

        assert!(body.is_consumed());
        assert!(other_handle.take().is_none());
        assert!(other_handle.bytes_with_limit(16).await.is_err());
    }

    #[tokio::test]
    async fn string_body() {
        let s = "Hello world".to_string();
        let len = s.len() as u64;

        let mut body = ResponseBody::from(s);
        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(bytes, Bytes::from("Hello world"));

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn empty_body() {
        let mut body = ResponseBody::from("");
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn stream_body() {
        let chunks: Vec<Result<_, io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"a"))),
            Ok(Frame::data(Bytes::from_static(b"b"))),
        ];
        let stream = futures::stream::iter(chunks).map_err(|e| HttpError::from(SendError::io(e)));
        let mut body = ResponseBody::stream(StreamBody::new(stream));

        assert!(body.size_hint().exact().is_none());
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().as_ref(), b"a");
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().as_ref(), b"b");
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn sized_stream_reports_its_length() {
        let chunks: Vec<Result<_, io::Error>> = vec![Ok(Frame::data(Bytes::from_static(b"abcd")))];
        let stream = futures::stream::iter(chunks).map_err(|e| HttpError::from(SendError::io(e)));
        let body = ResponseBody::sized_stream(StreamBody::new(stream), 4);
        assert_eq!(body.size_hint().exact(), Some(4));
    }
}
