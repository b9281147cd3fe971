//! Query-string decomposition into an ordered parameter list.

use crate::protocol::ParseError;
use http::Uri;

/// The decoded query parameters of a request-target.
///
/// Percent-escapes and `+` are decoded at parse time. Duplicate names are
/// kept in wire order; [`get`](Self::get) returns the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a raw query string (without the leading `?`).
    pub fn parse(query: &str) -> Result<Self, ParseError> {
        let params = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .map_err(|e| ParseError::invalid_header(format!("invalid query string: {e}")))?;
        Ok(Self { params })
    }

    /// Parses the query component of a URI; an absent query yields the
    /// empty parameter list.
    pub fn from_uri(uri: &Uri) -> Result<Self, ParseError> {
        match uri.query() {
            Some(query) => Self::parse(query),
            None => Ok(Self::empty()),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    /// First value registered under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Re-encodes the parameters into a query string.
    pub fn encode(&self) -> String {
        serde_urlencoded::to_string(&self.params).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple() {
        let params = QueryParams::parse("a=1&b=2").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get("b"), Some("2"));
        assert!(!params.has("c"));
    }

    #[test]
    fn duplicates_keep_order() {
        let params = QueryParams::parse("a=1&b=2&a=3").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("a"), Some("1"));
        let values: Vec<_> = params.iter().filter(|(n, _)| *n == "a").map(|(_, v)| v).collect();
        assert_eq!(values, vec!["1", "3"]);
    }

    #[test]
    fn percent_decoding() {
        let params = QueryParams::parse("name=hello%20world&sym=%26").unwrap();
        assert_eq!(params.get("name"), Some("hello world"));
        assert_eq!(params.get("sym"), Some("&"));
    }

    #[test]
    fn plus_is_space() {
        let params = QueryParams::parse("q=a+b").unwrap();
        assert_eq!(params.get("q"), Some("a b"));
    }

    #[test]
    fn from_uri_without_query() {
        let uri: Uri = "/index.html".parse().unwrap();
        assert!(QueryParams::from_uri(&uri).unwrap().is_empty());
    }

    #[test]
    fn encode_then_parse_is_identity() {
        let params = QueryParams::parse("a=1&name=hello%20world&a=3").unwrap();
        let reparsed = QueryParams::parse(&params.encode()).unwrap();
        assert_eq!(params, reparsed);
    }
}
