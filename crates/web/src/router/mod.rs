//! Pattern-based request routing.
//!
//! Patterns are slash-delimited; each segment is one [`RouteComponent`]:
//!
//! - a literal, compared byte-for-byte (case-sensitive)
//! - `:name`, matching any single non-empty segment and binding it
//! - a trailing `*`, matching everything that remains and binding it
//!   under `"*"`
//!
//! `"/"` has zero components and matches only the root. A trailing slash
//! is significant: `/a/` and `/a` are different routes.
//!
//! Routes are sorted once at build time so that more specific patterns
//! win: at each position literals beat named components beat wildcards,
//! leftmost position first, registration order breaking ties. Lookup is
//! pure; the table never changes after the server starts.

use crate::request::PathParams;
use crate::RequestHandler;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use kiln_http::config::Bufferization;
use thiserror::Error;

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteComponent {
    Literal(String),
    Named(String),
    Wildcard,
}

impl RouteComponent {
    /// Specificity rank; lower sorts (and therefore matches) first.
    fn rank(&self) -> u8 {
        match self {
            RouteComponent::Literal(_) => 0,
            RouteComponent::Named(_) => 1,
            RouteComponent::Wildcard => 2,
        }
    }
}

/// Rejected route patterns, reported when the router is built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern '{0}' does not start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{0}' has a named component with no name")]
    EmptyParameterName(String),

    #[error("pattern '{0}' has a wildcard before the final component")]
    WildcardNotLast(String),
}

/// Per-route overrides and response defaults.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    /// Overrides the configured bufferization for this route.
    pub bufferization: Option<Bufferization>,
    /// Tightens the configured content cap for this route's buffered
    /// reads; values above the global limit have no effect.
    pub max_content_length: Option<u64>,
    /// Headers merged into this route's responses when absent.
    pub default_headers: HeaderMap,
}

impl RouteOptions {
    pub fn default_header_add(&mut self, name: HeaderName, value: HeaderValue) {
        self.default_headers.append(name, value);
    }
}

/// A registered route.
pub struct Route {
    method: Method,
    pattern: String,
    components: Vec<RouteComponent>,
    handler: Box<dyn RequestHandler>,
    options: RouteOptions,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("components", &self.components)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn components(&self) -> &[RouteComponent] {
        &self.components
    }

    pub fn handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }
}

/// Result of resolving `(method, path)` against the table.
pub enum RouteMatch<'router> {
    /// A route matched both path and method.
    Found { route: &'router Route, params: PathParams },
    /// Some route matched the path, none matched the method; `allow`
    /// carries every method registered for the path, for the `Allow`
    /// header of the 405 response.
    MethodNotAllowed { allow: Vec<Method> },
    /// No route matched the path.
    NotFound,
}

/// The immutable, sorted route table.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder { routes: Vec::new() }
    }

    /// Resolves a request against the table.
    pub fn find(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let segments = segments(path);
        let mut allow: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(params) = match_components(&route.components, &segments) else {
                continue;
            };
            if &route.method == method {
                return RouteMatch::Found { route, params: PathParams::new(params) };
            }
            if !allow.contains(&route.method) {
                allow.push(route.method.clone());
            }
        }

        if allow.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed { allow }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Collects routes in registration order; [`build`](Self::build) parses
/// and validates every pattern, then sorts the table by specificity.
pub struct RouterBuilder {
    routes: Vec<(Method, String, Box<dyn RequestHandler>, RouteOptions)>,
}

impl RouterBuilder {
    pub fn route<H>(self, method: Method, pattern: impl Into<String>, handler: H) -> Self
    where
        H: RequestHandler + 'static,
    {
        self.route_with_options(method, pattern, handler, RouteOptions::default())
    }

    pub fn route_with_options<H>(
        mut self,
        method: Method,
        pattern: impl Into<String>,
        handler: H,
        options: RouteOptions,
    ) -> Self
    where
        H: RequestHandler + 'static,
    {
        self.routes.push((method, pattern.into(), Box::new(handler), options));
        self
    }

    /// Removes every route registered for `(method, pattern)`.
    pub fn remove(mut self, method: &Method, pattern: &str) -> Self {
        self.routes.retain(|(m, p, _, _)| !(m == method && p == pattern));
        self
    }

    pub fn build(self) -> Result<Router, PatternError> {
        let mut routes = Vec::with_capacity(self.routes.len());
        for (method, pattern, handler, options) in self.routes {
            let components = parse_pattern(&pattern)?;
            routes.push(Route { method, pattern, components, handler, options });
        }

        // stable sort keeps registration order among equally specific routes
        routes.sort_by(|a, b| {
            let a_ranks = a.components.iter().map(RouteComponent::rank);
            let b_ranks = b.components.iter().map(RouteComponent::rank);
            a_ranks.cmp(b_ranks)
        });

        Ok(Router { routes })
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<RouteComponent>, PatternError> {
    let Some(rest) = pattern.strip_prefix('/') else {
        return Err(PatternError::MissingLeadingSlash(pattern.to_string()));
    };

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let segments: Vec<&str> = rest.split('/').collect();
    let mut components = Vec::with_capacity(segments.len());

    for (index, segment) in segments.iter().enumerate() {
        let component = if *segment == "*" {
            if index != segments.len() - 1 {
                return Err(PatternError::WildcardNotLast(pattern.to_string()));
            }
            RouteComponent::Wildcard
        } else if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(PatternError::EmptyParameterName(pattern.to_string()));
            }
            RouteComponent::Named(name.to_string())
        } else {
            RouteComponent::Literal(segment.to_string())
        };
        components.push(component);
    }

    Ok(components)
}

/// Splits a request path the same way patterns are split, so the root has
/// zero segments and a trailing slash contributes an empty final segment.
fn segments(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}

fn match_components(components: &[RouteComponent], segments: &[&str]) -> Option<Vec<(String, String)>> {
    let mut params = Vec::new();

    for (index, component) in components.iter().enumerate() {
        match component {
            RouteComponent::Literal(literal) => {
                if segments.get(index).copied() != Some(literal.as_str()) {
                    return None;
                }
            }
            RouteComponent::Named(name) => {
                let segment = segments.get(index).copied()?;
                if segment.is_empty() {
                    return None;
                }
                params.push((name.clone(), segment.to_string()));
            }
            RouteComponent::Wildcard => {
                if index >= segments.len() {
                    return None;
                }
                params.push(("*".to_string(), segments[index..].join("/")));
                return Some(params);
            }
        }
    }

    if segments.len() == components.len() {
        Some(params)
    } else {
        None
    }
}
