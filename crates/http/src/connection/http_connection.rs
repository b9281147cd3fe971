use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, DATE};
use http::{HeaderValue, Method, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{error, info, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::{DecodeLimits, ErrorSender, Hooks, HtmlErrorSender, HttpConfig, NoHooks};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::{
    ConnectionOptions, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, RequestInfo,
    ResponseHead, SendError,
};

type OutFrame = Message<(ResponseHead, PayloadSize), Bytes>;

/// One accepted connection, from first byte to close.
///
/// The driver reads requests with a [`RequestDecoder`], dispatches each to
/// the handler in arrival order, and writes the handler's response through
/// a [`ResponseEncoder`] before the next request is dispatched, so
/// pipelined responses leave in request order. Body frames reach the
/// handler lazily through a relay running alongside the handler future.
///
/// # Lifecycle
///
/// - A connection idle longer than the configured timeout is answered
///   `408 Request Timeout` and shut down.
/// - A protocol error is answered with the status the parser attached to
///   it, then the connection is shut down.
/// - After every response the keep-alive rules decide whether to continue:
///   HTTP/1.0 closes unless the request said `keep-alive`, HTTP/1.1 stays
///   open unless either side said `close`.
/// - Shutdown flushes pending writes and sends FIN; a peer that already
///   closed mid-message has its in-flight request failed with 400.
pub struct HttpConnection<R, W> {
    config: Arc<HttpConfig>,
    hooks: Arc<dyn Hooks>,
    error_sender: Arc<dyn ErrorSender>,
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    requests: VecDeque<RequestInfo>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(config: Arc<HttpConfig>, reader: R, writer: W) -> Self {
        let limits = DecodeLimits::from(config.as_ref());
        Self {
            config,
            hooks: Arc::new(NoHooks),
            error_sender: Arc::new(HtmlErrorSender),
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(limits), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            requests: VecDeque::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_error_sender(mut self, error_sender: Arc<dyn ErrorSender>) -> Self {
        self.error_sender = error_sender;
        self
    }

    /// Runs the connection to completion.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin + Send,
        <H::RespBody as Body>::Error: Display,
    {
        let idle_timeout = self.config.connection_timeout;

        loop {
            let next = match timeout(idle_timeout, self.framed_read.next()).await {
                Ok(next) => next,
                Err(_elapsed) => {
                    self.hooks.on_trace("connection idle past the timeout");
                    warn!(?idle_timeout, "connection idle past the timeout");
                    self.send_error_response(StatusCode::REQUEST_TIMEOUT, Some("connection idle too long")).await?;
                    break;
                }
            };

            match next {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if !self.handle_request(header, payload_size, &handler).await? {
                        break;
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("payload frame outside a request, body relay out of sync");
                    self.send_error_response(StatusCode::BAD_REQUEST, None).await?;
                    self.shutdown().await;
                    return Err(ParseError::invalid_body("payload frame outside a request").into());
                }

                Some(Err(e)) => {
                    self.hooks.on_error(&format!("cannot parse request: {e}"));
                    error!("cannot parse request: {}", e);
                    let status = e.status();
                    self.send_error_response(status, Some(&e.to_string())).await?;
                    self.shutdown().await;
                    return Err(e.into());
                }

                None => {
                    info!("peer closed the connection");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Dispatches one request and writes its response. Returns whether the
    /// connection survives for the next pipelined request.
    async fn handle_request<H>(
        &mut self,
        header: RequestHeader,
        payload_size: PayloadSize,
        handler: &Arc<H>,
    ) -> Result<bool, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin + Send,
        <H::RespBody as Body>::Error: Display,
    {
        let version = header.version();
        let method = header.method().clone();
        let request_options = header.connection_options();
        let is_head = method == Method::HEAD;

        self.requests.push_back(RequestInfo::new(version, method, header.uri().to_string()));
        self.hooks.on_request_received(&header);

        if header.expects_100_continue() && version == Version::HTTP_11 {
            // interim response, written beneath the encoder: the encoder
            // state machine only tracks final responses
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            trace!("sent 100 continue before reading the body");
        }

        let (req_body, relay) = ReqBody::channel(&mut self.framed_read, payload_size);
        let request = header.body(req_body);

        let response_result = match relay {
            Some(mut relay) => {
                let result = {
                    tokio::pin! {
                        let handler_future = handler.call(request);
                        let relay_future = relay.run();
                    }

                    let mut relay_done = false;
                    let mut result = None;
                    // the handler and the relay feeding it must run
                    // concurrently: the handler may await body frames the
                    // relay has not read from the socket yet
                    loop {
                        select! {
                            biased;
                            response = &mut handler_future => {
                                result = Some(response);
                                break;
                            }
                            relay_result = &mut relay_future, if !relay_done => {
                                relay_done = true;
                                if let Err(e) = relay_result {
                                    trace!("body relay stopped early: {}", e);
                                }
                            }
                        }
                    }
                    result.expect("loop breaks only once the handler completed")
                };

                // drain whatever the handler left unread so the decoder
                // sits at the next request boundary
                if let Err(e) = relay.skip().await {
                    self.hooks.on_error(&format!("cannot finish reading request body: {e}"));
                    error!("cannot finish reading request body: {}", e);
                    let status = e.status();
                    self.send_error_response(status, Some(&e.to_string())).await?;
                    return Ok(false);
                }
                result
            }
            None => handler.call(request).await,
        };

        match response_result {
            Ok(response) => self.write_response(response, version, request_options, is_head).await,
            Err(e) => {
                let e = e.into();
                self.hooks.on_error(&format!("handler failed: {e}"));
                error!("handler failed: {}", e);
                self.write_error_response(StatusCode::INTERNAL_SERVER_ERROR, None, version, request_options, is_head)
                    .await
            }
        }
    }

    /// Finalizes headers, writes the response and records its status.
    /// Returns whether the connection stays open.
    async fn write_response<B>(
        &mut self,
        mut response: Response<B>,
        version: Version,
        request_options: ConnectionOptions,
        is_head: bool,
    ) -> Result<bool, HttpError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        *response.version_mut() = version;

        let response_options = ConnectionOptions::from_headers(response.headers());
        let close = request_options.should_close(version) || response_options.close();

        let headers = response.headers_mut();
        for name in self.config.default_headers.keys() {
            if !headers.contains_key(name) {
                for value in self.config.default_headers.get_all(name) {
                    headers.append(name.clone(), value.clone());
                }
            }
        }
        if !headers.contains_key(DATE) {
            let date = httpdate::fmt_http_date(SystemTime::now());
            headers.insert(DATE, HeaderValue::from_str(&date).expect("rfc1123 date is a valid header value"));
        }
        if close {
            if !response_options.close() {
                headers.insert(CONNECTION, HeaderValue::from_static("close"));
            }
        } else if version == Version::HTTP_10 {
            headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        let (parts, mut body) = response.into_parts();
        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };

        let head = Response::from_parts(parts, ());
        let status = head.status();

        self.framed_write.feed(Message::<_, Bytes>::Header((head, payload_size))).await?;

        if is_head {
            // framing headers answer as if the body were sent, the body
            // itself must not be
            self.framed_write.encoder_mut().skip_payload();
        } else {
            loop {
                match body.frame().await {
                    Some(Ok(frame)) => {
                        if let Ok(data) = frame.into_data() {
                            self.framed_write.feed(Message::<_, Bytes>::Payload(PayloadItem::Chunk(data))).await?;
                        }
                    }
                    Some(Err(e)) => {
                        return Err(SendError::invalid_body(format!("response body failed: {e}")).into());
                    }
                    None => {
                        self.framed_write.feed(Message::<_, Bytes>::Payload(PayloadItem::Eof)).await?;
                        break;
                    }
                }
            }
        }

        self.flush_writes().await?;

        if let Some(mut info) = self.requests.pop_front() {
            info.set_status(status);
            self.hooks.on_request_complete(&info);
        }

        Ok(!close)
    }

    /// Renders an error body through the configured sender and writes it
    /// as a closing response.
    async fn write_error_response(
        &mut self,
        status: StatusCode,
        detail: Option<&str>,
        version: Version,
        request_options: ConnectionOptions,
        is_head: bool,
    ) -> Result<bool, HttpError> {
        let (headers, body) = self.error_sender.render(status, detail);

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        response.headers_mut().extend(headers);
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));

        self.write_response(response, version, request_options, is_head).await?;
        Ok(false)
    }

    /// Error response outside any request context (parse failure, idle
    /// timeout). Always closes.
    async fn send_error_response(&mut self, status: StatusCode, detail: Option<&str>) -> Result<(), HttpError> {
        self.write_error_response(status, detail, Version::HTTP_11, ConnectionOptions::default(), false).await?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.flush_writes().await {
            trace!("flush on shutdown failed: {}", e);
        }
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            trace!("shutdown failed: {}", e);
        }
    }

    async fn flush_writes(&mut self) -> Result<(), SendError> {
        SinkExt::<OutFrame>::flush(&mut self.framed_write).await
    }
}
