use async_trait::async_trait;
use http::{Method, Response};
use kiln_web::router::Router;
use kiln_web::{OptionReqBody, RequestContext, RequestHandler, ResponseBody, Server};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

struct Hello;

#[async_trait]
impl RequestHandler for Hello {
    async fn invoke(&self, _ctx: &mut RequestContext<'_>, _body: OptionReqBody) -> Response<ResponseBody> {
        Response::new(ResponseBody::from("hello world"))
    }
}

struct Greet;

#[async_trait]
impl RequestHandler for Greet {
    async fn invoke(&self, ctx: &mut RequestContext<'_>, _body: OptionReqBody) -> Response<ResponseBody> {
        let name = ctx.named_parameter("name").unwrap_or("stranger");
        Response::new(ResponseBody::from(format!("hello, {name}\n")))
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .route(Method::GET, "/", Hello)
        .route(Method::GET, "/greet/:name", Greet)
        .build()
        .expect("valid patterns");

    let server = Server::builder().router(router).address("127.0.0.1", 8080).build().expect("valid configuration");

    if let Err(e) = server.start().await {
        eprintln!("server failed: {e}");
    }
}
