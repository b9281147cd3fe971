//! Connection-header options and the keep-alive decision.

use http::header::CONNECTION;
use http::{HeaderMap, Version};

/// The set of options carried by a message's `Connection` header.
///
/// Tokens are matched case-insensitively; unknown tokens are ignored.
/// A message may legitimately carry several `Connection` fields, and a
/// broken one may carry both `keep-alive` and `close`. In the latter case
/// `close` wins: a peer that asked to close gets the connection closed.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    keep_alive: bool,
    close: bool,
}

impl ConnectionOptions {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut options = Self::default();
        for value in headers.get_all(CONNECTION) {
            let Ok(value) = value.to_str() else { continue };
            for token in value.split(',') {
                let token = token.trim();
                if token.eq_ignore_ascii_case("keep-alive") {
                    options.keep_alive = true;
                } else if token.eq_ignore_ascii_case("close") {
                    options.close = true;
                }
            }
        }
        options
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    #[inline]
    pub fn close(&self) -> bool {
        self.close
    }

    /// Whether a connection carrying these options should be closed after
    /// the current exchange.
    ///
    /// HTTP/1.0 defaults to closing and stays open only on an explicit
    /// `keep-alive`; HTTP/1.1 defaults to staying open and closes only on
    /// an explicit `close`. Any other version closes.
    pub fn should_close(&self, version: Version) -> bool {
        if self.close {
            return true;
        }
        match version {
            Version::HTTP_10 => !self.keep_alive,
            Version::HTTP_11 => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(CONNECTION, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn empty_header() {
        let options = ConnectionOptions::from_headers(&HeaderMap::new());
        assert!(!options.keep_alive());
        assert!(!options.close());
        assert!(options.should_close(Version::HTTP_10));
        assert!(!options.should_close(Version::HTTP_11));
    }

    #[test]
    fn keep_alive_any_case() {
        let options = ConnectionOptions::from_headers(&headers(&["Keep-Alive"]));
        assert!(options.keep_alive());
        assert!(!options.should_close(Version::HTTP_10));
    }

    #[test]
    fn close_on_http11() {
        let options = ConnectionOptions::from_headers(&headers(&["close"]));
        assert!(options.should_close(Version::HTTP_11));
    }

    #[test]
    fn close_wins_over_keep_alive() {
        let options = ConnectionOptions::from_headers(&headers(&["keep-alive, close"]));
        assert!(options.keep_alive());
        assert!(options.close());
        assert!(options.should_close(Version::HTTP_10));
        assert!(options.should_close(Version::HTTP_11));
    }

    #[test]
    fn tokens_across_multiple_fields() {
        let options = ConnectionOptions::from_headers(&headers(&["upgrade", "close"]));
        assert!(options.close());
    }
}
