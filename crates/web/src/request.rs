//! The per-request view handlers work with.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, Version};
use kiln_http::protocol::{DecodedContent, FormData, QueryParams, Ranges, RequestHeader};
use mime::Mime;

/// Parameters bound by the router from the matched pattern's named and
/// wildcard components.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(params: Vec<(String, String)>) -> Self {
        Self { params }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// The value bound under `name`; a trailing wildcard binds under `*`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Everything a handler may want to know about the request being served.
///
/// Wraps the parsed head and joins it with what the routing and buffering
/// stages produced: bound path parameters, decoded query parameters, the
/// buffered body (unless the route streams) and the decoded content, when
/// a content decoder matched the request's media type.
pub struct RequestContext<'req> {
    header: &'req RequestHeader,
    params: PathParams,
    query: QueryParams,
    body: Option<Bytes>,
    content: Option<DecodedContent>,
}

impl<'req> RequestContext<'req> {
    pub fn new(header: &'req RequestHeader, params: PathParams, query: QueryParams) -> Self {
        Self { header, params, query, body: None, content: None }
    }

    pub fn request_header(&self) -> &RequestHeader {
        self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn path_params(&self) -> &PathParams {
        &self.params
    }

    /// A parameter bound by a `:name` (or trailing `*`) pattern component.
    pub fn named_parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.query
    }

    pub fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query.get(name)
    }

    pub fn has_query_parameter(&self, name: &str) -> bool {
        self.query.has(name)
    }

    pub fn content_type(&self) -> Option<Mime> {
        self.header.content_type()
    }

    pub fn ranges(&self) -> Option<Ranges> {
        self.header.ranges()
    }

    /// The buffered request body. `None` when the route streams its body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The decoded content, downcast to the decoder's output type.
    pub fn content<T: 'static>(&self) -> Option<&T> {
        self.content.as_ref()?.downcast_ref()
    }

    /// Decoded form data, for `application/x-www-form-urlencoded` bodies.
    pub fn form_data(&self) -> Option<&FormData> {
        self.content::<FormData>()
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = Some(body);
    }

    pub(crate) fn set_content(&mut self, content: DecodedContent) {
        self.content = Some(content);
    }
}
