//! The outbound side of the library.
//!
//! [`ClientConnection`] speaks HTTP/1.x over any stream: it serializes
//! requests, tracks them in a FIFO of [`RequestInfo`]s, and pairs each
//! decoded response with the oldest in-flight request, which is exactly
//! the pipelining contract of HTTP/1.1. [`HttpClient`] adds TCP dialing
//! (deferred until the first send) on top.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use http::{HeaderMap, Method, Request, Uri, Version};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::io::ReaderStream;
use tracing::{info, trace};

use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::config::{DecodeLimits, HttpConfig};
use crate::protocol::{
    HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestInfo, ResponseHeader, SendError,
};

type OutFrame = Message<(Request<()>, PayloadSize), Bytes>;

/// A complete response paired with the request it answers.
#[derive(Debug)]
pub struct ClientResponse {
    pub info: RequestInfo,
    pub header: ResponseHeader,
    pub body: Bytes,
}

/// One HTTP/1.x connection from the client side, generic over the stream.
pub struct ClientConnection<S> {
    framed_read: FramedRead<ReadHalf<S>, ResponseDecoder>,
    framed_write: FramedWrite<WriteHalf<S>, RequestEncoder>,
    pending: VecDeque<RequestInfo>,
    max_content_length: u64,
}

impl<S> ClientConnection<S>
where
    S: AsyncRead + AsyncWrite,
{
    pub fn new(config: &HttpConfig, stream: S) -> Self {
        let limits = DecodeLimits::from(config);
        let (reader, writer) = tokio::io::split(stream);
        Self {
            framed_read: FramedRead::with_capacity(reader, ResponseDecoder::new(limits), 8 * 1024),
            framed_write: FramedWrite::new(writer, RequestEncoder::new()),
            pending: VecDeque::new(),
            max_content_length: config.max_content_length,
        }
    }

    /// Number of requests sent whose responses have not arrived yet.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Sends a bodiless request.
    pub async fn send_request(&mut self, method: Method, uri: Uri, headers: HeaderMap) -> Result<(), HttpError> {
        let head = build_head(method.clone(), uri.clone(), headers);
        self.track(&method, &uri);
        self.framed_write.send(OutFrame::Header((head, PayloadSize::Empty))).await?;
        Ok(())
    }

    /// Sends a request with an in-memory body, framed by content length.
    pub async fn send_request_with_body(
        &mut self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<(), HttpError> {
        let head = build_head(method.clone(), uri.clone(), headers);
        self.track(&method, &uri);

        let length = body.len() as u64;
        self.framed_write.feed(OutFrame::Header((head, PayloadSize::Length(length)))).await?;
        if length > 0 {
            self.framed_write.feed(OutFrame::Payload(PayloadItem::Chunk(body))).await?;
        }
        self.framed_write.feed(OutFrame::Payload(PayloadItem::Eof)).await?;
        self.flush_writes().await?;
        Ok(())
    }

    /// Sends a request whose body is streamed from an open file.
    pub async fn send_request_with_file(
        &mut self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        file: tokio::fs::File,
        length: u64,
    ) -> Result<(), HttpError> {
        let head = build_head(method.clone(), uri.clone(), headers);
        self.track(&method, &uri);

        self.framed_write.feed(OutFrame::Header((head, PayloadSize::Length(length)))).await?;
        if length > 0 {
            let mut reader = ReaderStream::new(file);
            let mut sent: u64 = 0;
            while let Some(chunk) = reader.next().await {
                let chunk = chunk.map_err(SendError::io)?;
                sent += chunk.len() as u64;
                if sent > length {
                    return Err(SendError::invalid_body("file grew past the declared length").into());
                }
                self.framed_write.feed(OutFrame::Payload(PayloadItem::Chunk(chunk))).await?;
            }
            if sent < length {
                return Err(SendError::invalid_body("file shorter than the declared length").into());
            }
        }
        self.framed_write.feed(OutFrame::Payload(PayloadItem::Eof)).await?;
        self.flush_writes().await?;
        Ok(())
    }

    /// Receives the next response and pairs it with the oldest in-flight
    /// request. The body is buffered up to the configured content limit.
    pub async fn recv_response(&mut self) -> Result<ClientResponse, HttpError> {
        let front = self
            .pending
            .front()
            .ok_or_else(|| ParseError::invalid_body("no request in flight"))?;
        self.framed_read.decoder_mut().set_head_request(front.method() == Method::HEAD);

        let (header, payload_size) = loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header(head))) => break head,
                Some(Ok(Message::Payload(_))) => {
                    return Err(ParseError::invalid_body("payload frame before a response head").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(ParseError::invalid_body("connection closed before a response").into()),
            }
        };

        let mut body = BytesMut::new();
        // empty bodies have no payload phase to drain
        while !payload_size.is_empty() {
            match self.framed_read.next().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => {
                    if body.len() as u64 + bytes.len() as u64 > self.max_content_length {
                        return Err(ParseError::ContentTooLarge {
                            length: body.len() as u64 + bytes.len() as u64,
                            max: self.max_content_length,
                        }
                        .into());
                    }
                    body.put(bytes);
                }
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => {
                    return Err(ParseError::invalid_body("response head inside a body").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    // the until-close decoder emits Eof through decode_eof,
                    // so a bare None here means the body was truncated
                    return Err(ParseError::invalid_body("connection closed inside a response body").into());
                }
            }
        }

        let mut info = self.pending.pop_front().expect("checked non-empty above");
        info.set_status(header.status());
        trace!(status = %header.status(), uri = info.uri(), "paired response with request");

        Ok(ClientResponse { info, header, body: body.freeze() })
    }

    fn track(&mut self, method: &Method, uri: &Uri) {
        self.pending.push_back(RequestInfo::new(Version::HTTP_11, method.clone(), uri.to_string()));
    }

    async fn flush_writes(&mut self) -> Result<(), SendError> {
        SinkExt::<OutFrame>::flush(&mut self.framed_write).await
    }
}

fn build_head(method: Method, uri: Uri, headers: HeaderMap) -> Request<()> {
    let mut head = Request::new(());
    *head.method_mut() = method;
    *head.uri_mut() = uri;
    *head.headers_mut() = headers;
    *head.version_mut() = Version::HTTP_11;
    head
}

/// A TCP client owning exactly one connection, dialed on first use.
pub struct HttpClient {
    config: Arc<HttpConfig>,
    connection: Option<ClientConnection<TcpStream>>,
}

impl HttpClient {
    pub fn new(config: Arc<HttpConfig>) -> Self {
        Self { config, connection: None }
    }

    /// Whether the underlying connection has been established.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn pending_requests(&self) -> usize {
        self.connection.as_ref().map(|c| c.pending_requests()).unwrap_or(0)
    }

    /// Drops the current connection; the next send dials again.
    pub fn disconnect(&mut self) {
        self.connection = None;
    }

    pub async fn send_request(&mut self, method: Method, uri: Uri, headers: HeaderMap) -> Result<(), HttpError> {
        self.connection().await?.send_request(method, uri, headers).await
    }

    pub async fn send_request_with_body(
        &mut self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<(), HttpError> {
        self.connection().await?.send_request_with_body(method, uri, headers, body).await
    }

    pub async fn send_request_with_file(
        &mut self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        file: tokio::fs::File,
        length: u64,
    ) -> Result<(), HttpError> {
        self.connection().await?.send_request_with_file(method, uri, headers, file, length).await
    }

    pub async fn recv_response(&mut self) -> Result<ClientResponse, HttpError> {
        match &mut self.connection {
            Some(connection) => connection.recv_response().await,
            None => Err(ParseError::invalid_body("no request in flight").into()),
        }
    }

    async fn connection(&mut self) -> Result<&mut ClientConnection<TcpStream>, HttpError> {
        if self.connection.is_none() {
            let address = (self.config.host.as_str(), self.config.port);
            let stream = TcpStream::connect(address).await.map_err(SendError::io)?;
            info!(host = %self.config.host, port = self.config.port, "connected");
            self.connection = Some(ClientConnection::new(&self.config, stream));
        }
        Ok(self.connection.as_mut().expect("just connected"))
    }
}
