//! The route handler trait.

use crate::{OptionReqBody, RequestContext, ResponseBody};
use async_trait::async_trait;
use http::Response;

/// A route handler: turns one request into one response.
///
/// Handlers read request facts from the [`RequestContext`] (named and
/// query parameters, buffered body, decoded content) and, when the route
/// streams its body, consume it through the [`OptionReqBody`]. They run on
/// the connection's task and must not block the thread.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &mut RequestContext<'_>, body: OptionReqBody) -> Response<ResponseBody>;
}
