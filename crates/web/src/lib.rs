//! Routing and server assembly on top of `kiln_http`.
//!
//! This crate turns the protocol core into a usable embedded server:
//! a pattern-based [`router`], the [`RequestContext`] handlers work with,
//! response body types, and the [`Server`] that binds listeners, accepts
//! connections and dispatches requests.
//!
//! ```no_run
//! use http::{Method, Response};
//! use kiln_web::router::Router;
//! use kiln_web::{OptionReqBody, RequestContext, RequestHandler, ResponseBody, Server};
//!
//! struct Hello;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler for Hello {
//!     async fn invoke(&self, _ctx: &mut RequestContext<'_>, _body: OptionReqBody) -> Response<ResponseBody> {
//!         Response::new(ResponseBody::from("hi"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::builder().route(Method::GET, "/hello", Hello).build().unwrap();
//!     let server = Server::builder().router(router).address("127.0.0.1", 8080).build().unwrap();
//!     server.start().await.unwrap();
//! }
//! ```

pub mod router;

mod handler;
pub use handler::RequestHandler;

mod request;
pub use request::PathParams;
pub use request::RequestContext;

mod body;
pub use body::OptionReqBody;
pub use body::ResponseBody;

mod server;
pub use server::Server;
pub use server::ServerBuildError;
pub use server::ServerBuilder;
pub use server::ServerError;
