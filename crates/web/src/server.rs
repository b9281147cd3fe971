//! Server assembly: builder, listener set, accept loop and dispatch.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use http::header::ALLOW;
use http::{HeaderValue, Request, Response, StatusCode};
use kiln_http::config::{Bufferization, ErrorSender, Hooks, HtmlErrorSender, HttpConfig, NoHooks};
use kiln_http::connection::HttpConnection;
use kiln_http::handler::Handler;
use kiln_http::protocol::body::ReqBody;
use kiln_http::protocol::{HttpError, ParseError, RequestHeader};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, trace, warn};

use crate::router::{RouteMatch, Router};
use crate::{OptionReqBody, PathParams, RequestContext, RequestHandler, ResponseBody};

/// Errors detected while assembling a [`Server`].
#[derive(Debug, Error)]
pub enum ServerBuildError {
    #[error("a router must be set")]
    MissingRouter,

    #[error("use_tls is set but certificate or key material is missing")]
    MissingTlsMaterial,
}

/// Errors raised while starting or running a [`Server`].
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot resolve '{host}': {source}")]
    Resolve { host: String, source: std::io::Error },

    #[error("'{host}' resolved to no addresses")]
    NoAddresses { host: String },

    #[error("cannot bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: std::io::Error },

    #[error("use_tls requires the embedder to wrap streams and call serve_connection")]
    TlsTransportRequired,
}

pub struct ServerBuilder {
    config: HttpConfig,
    router: Option<Router>,
    default_handler: Option<Box<dyn RequestHandler>>,
    hooks: Arc<dyn Hooks>,
    error_sender: Arc<dyn ErrorSender>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            config: HttpConfig::default(),
            router: None,
            default_handler: None,
            hooks: Arc::new(NoHooks),
            error_sender: Arc::new(HtmlErrorSender),
        }
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for setting host and port on the configuration.
    pub fn address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.config.host = host.into();
        self.config.port = port;
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Handler invoked when no route matches the path (instead of 404).
    pub fn default_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(handler));
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn error_sender(mut self, error_sender: Arc<dyn ErrorSender>) -> Self {
        self.error_sender = error_sender;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        if self.config.use_tls && (self.config.tls_certificate.is_none() || self.config.tls_key.is_none()) {
            return Err(ServerBuildError::MissingTlsMaterial);
        }
        Ok(Server {
            config: Arc::new(self.config),
            router,
            default_handler: self.default_handler,
            hooks: self.hooks,
            error_sender: self.error_sender,
        })
    }
}

/// The assembled server: configuration, route table and dispatch logic.
///
/// `Server` implements the core [`Handler`] trait; the connection driver
/// calls [`Handler::call`] once per decoded request and `Server` routes it
/// to the matching [`RequestHandler`].
pub struct Server {
    config: Arc<HttpConfig>,
    router: Router,
    default_handler: Option<Box<dyn RequestHandler>>,
    hooks: Arc<dyn Hooks>,
    error_sender: Arc<dyn ErrorSender>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Binds the configured address and serves until the process ends.
    pub async fn start(self) -> Result<(), ServerError> {
        self.start_with_shutdown(std::future::pending::<()>()).await
    }

    /// Binds one listening socket per resolved address and serves until
    /// `signal` completes; then stops accepting and waits for open
    /// connections to finish their current exchange.
    pub async fn start_with_shutdown<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        if self.config.use_tls {
            // the core never performs TLS record I/O; a TLS embedder
            // accepts and wraps streams itself, then calls serve_connection
            return Err(ServerError::TlsTransportRequired);
        }

        let host = self.config.host.clone();
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), self.config.port))
            .await
            .map_err(|source| ServerError::Resolve { host: host.clone(), source })?
            .collect();
        if addrs.is_empty() {
            return Err(ServerError::NoAddresses { host });
        }

        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in addrs {
            let socket = match addr {
                SocketAddr::V4(_) => TcpSocket::new_v4(),
                SocketAddr::V6(_) => TcpSocket::new_v6(),
            }
            .map_err(|source| ServerError::Bind { addr, source })?;
            socket.bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
            let listener =
                socket.listen(self.config.connection_backlog).map_err(|source| ServerError::Bind { addr, source })?;
            info!(%addr, "listening");
            listeners.push(listener);
        }

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let server = Arc::new(self);

        for listener in listeners {
            let server = server.clone();
            let token = token.clone();
            let tracker_for_connections = tracker.clone();
            tracker.spawn(accept_loop(listener, server, token, tracker_for_connections));
        }

        signal.await;
        info!("shutting down");
        token.cancel();
        tracker.close();
        tracker.wait().await;
        Ok(())
    }

    /// Serves one already-accepted stream to completion. This is also the
    /// entry point for TLS embedders and in-memory transports.
    pub async fn serve_connection<S>(self: Arc<Self>, stream: S) -> Result<(), HttpError>
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let (reader, writer) = tokio::io::split(stream);
        let connection = HttpConnection::new(self.config.clone(), reader, writer)
            .with_hooks(self.hooks.clone())
            .with_error_sender(self.error_sender.clone());
        connection.process(self).await
    }

    async fn dispatch(&self, header: RequestHeader, req_body: OptionReqBody) -> Response<ResponseBody> {
        // '*' is parsed but unsupported: it only applies to server-wide
        // OPTIONS, which this library does not implement
        if header.uri().path() == "*" {
            trace!("rejecting '*' request target");
            return self.error_page(StatusCode::BAD_REQUEST, Some("the '*' request target is not supported"));
        }

        let query = match header.query_params() {
            Ok(query) => query,
            Err(e) => {
                trace!("cannot parse query parameters: {}", e);
                return self.error_page(StatusCode::BAD_REQUEST, Some(&e.to_string()));
            }
        };

        let path = header.uri().path().to_string();
        match self.router.find(header.method(), &path) {
            RouteMatch::Found { route, params } => {
                let options = route.options();
                let bufferization = options.bufferization.unwrap_or(self.config.bufferization);
                let max_content_length =
                    options.max_content_length.unwrap_or(self.config.max_content_length).min(self.config.max_content_length);

                let mut ctx = RequestContext::new(&header, params, query);

                if !matches!(bufferization, Bufferization::Stream) {
                    match req_body.bytes_with_limit(max_content_length).await {
                        Ok(body) => {
                            if let Some(media_type) = ctx.content_type() {
                                if let Some(decoder) = self.config.content_decoder(&media_type) {
                                    match decoder.decode(&body) {
                                        Ok(content) => ctx.set_content(content),
                                        Err(e) => {
                                            trace!("cannot decode request content: {}", e);
                                            return self.error_page(StatusCode::BAD_REQUEST, Some(&e.to_string()));
                                        }
                                    }
                                }
                            }
                            ctx.set_body(body);
                        }
                        Err(e @ ParseError::ContentTooLarge { .. }) => {
                            warn!("request body over the route limit: {}", e);
                            return self.error_page(StatusCode::PAYLOAD_TOO_LARGE, Some(&e.to_string()));
                        }
                        Err(e) => {
                            warn!("cannot buffer request body: {}", e);
                            return self.error_page(StatusCode::BAD_REQUEST, Some(&e.to_string()));
                        }
                    }
                }

                let mut response = route.handler().invoke(&mut ctx, req_body).await;

                let headers = response.headers_mut();
                for name in options.default_headers.keys() {
                    if !headers.contains_key(name) {
                        for value in options.default_headers.get_all(name) {
                            headers.append(name.clone(), value.clone());
                        }
                    }
                }
                response
            }

            RouteMatch::MethodNotAllowed { allow } => {
                let mut response = self.error_page(StatusCode::METHOD_NOT_ALLOWED, None);
                let allowed = allow.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_str(&allowed).expect("method names are valid header values"));
                response
            }

            RouteMatch::NotFound => match &self.default_handler {
                Some(handler) => {
                    let mut ctx = RequestContext::new(&header, PathParams::empty(), query);
                    handler.invoke(&mut ctx, req_body).await
                }
                None => self.error_page(StatusCode::NOT_FOUND, None),
            },
        }
    }

    fn error_page(&self, status: StatusCode, detail: Option<&str>) -> Response<ResponseBody> {
        let (headers, body) = self.error_sender.render(status, detail);
        let mut response = Response::new(ResponseBody::from(body));
        *response.status_mut() = status;
        response.headers_mut().extend(headers);
        response
    }
}

impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = HttpError;
    type Fut<'fut> = Pin<Box<dyn Future<Output = Result<Response<Self::RespBody>, Self::Error>> + Send + 'fut>>;

    fn call(&self, req: Request<ReqBody>) -> Self::Fut<'_> {
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let header = RequestHeader::from(parts);
            let req_body = OptionReqBody::new(body);
            Ok(self.dispatch(header, req_body).await)
        })
    }
}

async fn accept_loop(listener: TcpListener, server: Arc<Server>, token: CancellationToken, tracker: TaskTracker) {
    loop {
        select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let server = server.clone();
                        let token = token.clone();
                        tracker.spawn(async move {
                            select! {
                                result = server.serve_connection(stream) => {
                                    match result {
                                        Ok(()) => info!(%peer, "connection finished"),
                                        Err(e) => error!(%peer, "connection failed: {}", e),
                                    }
                                }
                                _ = token.cancelled() => {
                                    info!(%peer, "connection dropped at shutdown");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        warn!("failed to accept: {}", e);
                    }
                }
            }
        }
    }
}
