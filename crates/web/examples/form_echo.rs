//! Echoes urlencoded form posts back as plain text.
//!
//! ```sh
//! curl -d 'name=alice&city=utrecht' http://127.0.0.1:8080/submit
//! ```

use async_trait::async_trait;
use http::{Method, Response, StatusCode};
use kiln_web::router::Router;
use kiln_web::{OptionReqBody, RequestContext, RequestHandler, ResponseBody, Server};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

struct EchoForm;

#[async_trait]
impl RequestHandler for EchoForm {
    async fn invoke(&self, ctx: &mut RequestContext<'_>, _body: OptionReqBody) -> Response<ResponseBody> {
        let Some(form) = ctx.form_data() else {
            let mut response = Response::new(ResponseBody::from("expected a urlencoded form\n"));
            *response.status_mut() = StatusCode::UNSUPPORTED_MEDIA_TYPE;
            return response;
        };

        let mut out = String::new();
        for (name, value) in form.iter() {
            out.push_str(name);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        Response::new(ResponseBody::from(out))
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder().route(Method::POST, "/submit", EchoForm).build().expect("valid patterns");

    let server = Server::builder().router(router).address("127.0.0.1", 8080).build().expect("valid configuration");

    if let Err(e) = server.start().await {
        eprintln!("server failed: {e}");
    }
}
