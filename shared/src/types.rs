//! Core shared types: addresses, content types, headers and payloads

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

use crate::errors::{SharedError, SharedResult};

/// Logical endpoint address understood by a routing collaborator.
///
/// Addresses are URLs: either hierarchical (`http://localhost:9090/services/targetWS`)
/// or opaque scheme addresses used by in-process buses (`vm:test.input`).
/// Validation happens once, when a scenario is built.
///
/// HTTP endpoints are routed by host, port and path only, so two addresses
/// that differ just in their query string (`?wsdlURL=...`) name the same
/// endpoint; see [`Address::endpoint_key`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(Url);

impl Address {
    pub fn parse(input: &str) -> SharedResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SharedError::InvalidAddress {
                input: input.to_string(),
                reason: "address is empty".to_string(),
            });
        }

        let url = Url::parse(trimmed).map_err(|e| SharedError::InvalidAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        if matches!(url.scheme(), "http" | "https") && url.host_str().is_none_or(str::is_empty) {
            return Err(SharedError::InvalidAddress {
                input: input.to_string(),
                reason: "http address has no host".to_string(),
            });
        }

        if url.cannot_be_a_base() && url.path().is_empty() {
            return Err(SharedError::InvalidAddress {
                input: input.to_string(),
                reason: "address has a scheme but no destination".to_string(),
            });
        }

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// True for addresses served by the HTTP transport
    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), "http" | "https")
    }

    /// Host and port for HTTP addresses (`None` for opaque addresses)
    pub fn host_port(&self) -> Option<(String, u16)> {
        if !self.is_http() {
            return None;
        }
        let host = self.0.host_str()?.to_string();
        let port = self.0.port_or_known_default()?;
        Some((host, port))
    }

    /// Path component; for opaque addresses this is the destination name
    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// The part of the address a transport routes on
    ///
    /// Query and fragment are dropped for HTTP addresses; opaque addresses
    /// are kept whole.
    pub fn endpoint_key(&self) -> String {
        match self.host_port() {
            Some((host, port)) => format!("{}://{}:{}{}", self.scheme(), host, port, self.path()),
            None => self.as_str().to_string(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0.into()
    }
}

/// Content type of a payload, used to pick a canonical form for matching
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Text,
    Json,
    Xml,
}

impl ContentType {
    /// Best-effort mapping from a MIME type header value
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("json") {
            ContentType::Json
        } else if mime.contains("xml") {
            ContentType::Xml
        } else {
            ContentType::Text
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain; charset=utf-8",
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Text => write!(f, "text"),
            ContentType::Json => write!(f, "json"),
            ContentType::Xml => write!(f, "xml"),
        }
    }
}

/// Message headers with case-insensitive keys
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: AsRef<str>, V: Into<String>>(&mut self, key: K, value: V) {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Builder-style insert
    pub fn with<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (key, value) in iter {
            headers.insert(key, value);
        }
        headers
    }
}

/// A message body tagged with its content type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Payload {
    pub content_type: ContentType,
    pub body: String,
}

impl Payload {
    pub fn new<S: Into<String>>(content_type: ContentType, body: S) -> Self {
        Self {
            content_type,
            body: body.into(),
        }
    }

    pub fn text<S: Into<String>>(body: S) -> Self {
        Self::new(ContentType::Text, body)
    }

    pub fn json<S: Into<String>>(body: S) -> Self {
        Self::new(ContentType::Json, body)
    }

    pub fn xml<S: Into<String>>(body: S) -> Self {
        Self::new(ContentType::Xml, body)
    }

    /// Load a payload body from a file (test data kept next to the scenarios)
    pub fn from_file<P: AsRef<Path>>(path: P, content_type: ContentType) -> SharedResult<Self> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|source| SharedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(content_type, body))
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_endpoint_key_ignores_http_query() {
        let plain = Address::parse("http://localhost:9090/services/targetWS").unwrap();
        let with_query = Address::parse("http://localhost:9090/services/targetWS?wsdlURL=ping.wsdl").unwrap();
        assert_ne!(plain, with_query);
        assert_eq!(plain.endpoint_key(), with_query.endpoint_key());
        assert_eq!(plain.endpoint_key(), "http://localhost:9090/services/targetWS");

        let queue = Address::parse("vm:test.input").unwrap();
        assert_eq!(queue.endpoint_key(), "vm:test.input");
    }

    #[test]
    fn test_address_accepts_http_and_opaque_forms() {
        let http = Address::parse("http://localhost:9090/services/targetWS").unwrap();
        assert!(http.is_http());
        assert_eq!(http.host_port(), Some(("localhost".to_string(), 9090)));
        assert_eq!(http.path(), "/services/targetWS");

        let queue = Address::parse("vm:test.input").unwrap();
        assert!(!queue.is_http());
        assert_eq!(queue.scheme(), "vm");
        assert_eq!(queue.as_str(), "vm:test.input");
        assert_eq!(queue.host_port(), None);
    }

    #[test]
    fn test_address_rejects_malformed_input() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("   ").is_err());
        assert!(Address::parse("no-scheme-here").is_err());
        assert!(Address::parse("http://").is_err());
        assert!(Address::parse("vm:").is_err());
    }

    #[test]
    fn test_address_serde_uses_string_form() {
        let address = Address::parse("vm:test.output").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"vm:test.output\"");

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
        assert!(serde_json::from_str::<Address>("\"nonsense\"").is_err());
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers = Headers::new().with("Content-Type", "application/json").with("X-Trace", "1");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("X-TRACE"), Some("1"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_content_type_from_mime() {
        assert_eq!(ContentType::from_mime("application/json; charset=utf-8"), ContentType::Json);
        assert_eq!(ContentType::from_mime("text/xml"), ContentType::Xml);
        assert_eq!(ContentType::from_mime("application/soap+xml"), ContentType::Xml);
        assert_eq!(ContentType::from_mime("text/plain"), ContentType::Text);
    }

    #[test]
    fn test_payload_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<pingRequest/>").unwrap();

        let payload = Payload::from_file(file.path(), ContentType::Xml).unwrap();
        assert_eq!(payload.body, "<pingRequest/>");
        assert_eq!(payload.content_type, ContentType::Xml);

        assert!(Payload::from_file("/definitely/not/here.xml", ContentType::Xml).is_err());
    }
}
