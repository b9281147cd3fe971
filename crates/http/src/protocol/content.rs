//! Pluggable content decoders keyed by base media type.
//!
//! A decoder turns a fully buffered body into a typed value that handlers
//! can downcast. The urlencoded-form decoder is part of every
//! configuration; embedders register further decoders through
//! [`HttpConfig::content_decoder_add`](crate::config::HttpConfig::content_decoder_add).

use crate::protocol::ParseError;
use bytes::Bytes;
use mime::Mime;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A decoded body. Handlers downcast this to the type their decoder
/// produces; the built-in form decoder produces [`FormData`].
pub type DecodedContent = Box<dyn Any + Send + Sync>;

type DecodeFn = dyn Fn(&Bytes) -> Result<DecodedContent, ParseError> + Send + Sync;

/// A content decoder registered for one base media type.
#[derive(Clone)]
pub struct ContentDecoder {
    media_type: Mime,
    decode: Arc<DecodeFn>,
}

impl ContentDecoder {
    pub fn new<F>(media_type: Mime, decode: F) -> Self
    where
        F: Fn(&Bytes) -> Result<DecodedContent, ParseError> + Send + Sync + 'static,
    {
        Self { media_type, decode: Arc::new(decode) }
    }

    /// The base media type this decoder is keyed on; parameters such as
    /// `charset` are ignored during lookup.
    pub fn media_type(&self) -> &Mime {
        &self.media_type
    }

    pub fn matches(&self, media_type: &Mime) -> bool {
        self.media_type.type_() == media_type.type_() && self.media_type.subtype() == media_type.subtype()
    }

    pub fn decode(&self, body: &Bytes) -> Result<DecodedContent, ParseError> {
        (self.decode)(body)
    }
}

impl fmt::Debug for ContentDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentDecoder").field("media_type", &self.media_type).finish()
    }
}

/// Decoded `application/x-www-form-urlencoded` content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    params: Vec<(String, String)>,
}

impl FormData {
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        let params = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .map_err(|e| ParseError::invalid_body(format!("invalid form data: {e}")))?;
        Ok(Self { params })
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    pub fn get_parameter(&self, name: &str) -> Option<&str> {
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
}

/// The form decoder every configuration starts with.
pub fn form_decoder() -> ContentDecoder {
    ContentDecoder::new(mime::APPLICATION_WWW_FORM_URLENCODED, |body| {
        FormData::parse(body).map(|form| Box::new(form) as DecodedContent)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_data_parse() {
        let form = FormData::parse(b"name=alice&city=the%20hague&tag=a&tag=b").unwrap();
        assert_eq!(form.len(), 4);
        assert!(form.has_parameter("name"));
        assert_eq!(form.get_parameter("city"), Some("the hague"));
        assert_eq!(form.get_parameter("tag"), Some("a"));
        assert!(!form.has_parameter("missing"));
    }

    #[test]
    fn form_decoder_produces_form_data() {
        let decoder = form_decoder();
        assert!(decoder.matches(&"application/x-www-form-urlencoded; charset=utf-8".parse::<Mime>().unwrap()));

        let content = decoder.decode(&Bytes::from_static(b"a=1")).unwrap();
        let form = content.downcast_ref::<FormData>().unwrap();
        assert_eq!(form.get_parameter("a"), Some("1"));
    }
}
