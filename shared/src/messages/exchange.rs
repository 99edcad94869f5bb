//! Request/reply envelopes
//!
//! A `Message` is what a routing collaborator carries. A `Reply` is what comes
//! back from a request-response interaction: either a success message or a
//! structured `Fault`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{Headers, Payload};

/// A payload plus its headers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            headers: Headers::new(),
        }
    }

    pub fn with_headers(payload: Payload, headers: Headers) -> Self {
        Self { payload, headers }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(&self) -> &str {
        &self.payload.body
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        Message::new(payload)
    }
}

/// Structured error reply: status (HTTP-like), optional application code and body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Payload>,
}

impl Fault {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            code: None,
            body: None,
        }
    }

    pub fn with_code<S: Into<String>>(mut self, code: S) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_body(mut self, body: Payload) -> Self {
        self.body = Some(body);
        self
    }

    /// 404-equivalent rejection used for traffic nobody should have sent
    pub fn not_found<S: Into<String>>(reason: S) -> Self {
        Self::new(404).with_code("NOT_FOUND").with_body(Payload::text(reason))
    }

    /// 500-equivalent rejection used when a call violates its expectation
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        Self::new(500).with_code("EXPECTATION_FAILED").with_body(Payload::text(reason))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fault {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " [{code}]")?;
        }
        if let Some(body) = &self.body {
            write!(f, ": {}", body.body)?;
        }
        Ok(())
    }
}

/// Outcome of a request-response interaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Success(Message),
    Fault(Fault),
}

impl Reply {
    pub fn success(payload: Payload) -> Self {
        Reply::Success(Message::new(payload))
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Reply::Fault(_))
    }
}
