//! Mock expectations
//!
//! A [`MockExpectation`] declares one expected call to a simulated endpoint,
//! the response that endpoint returns, and the ordering discipline the call
//! participates in. Expectations are built through [`ExpectationBuilder`] and
//! are read-only afterwards.

use serde::{Deserialize, Serialize};
use shared::{Address, Fault, Headers, Message, Payload, Reply};
use std::fmt;
use std::time::Duration;

use crate::engine::matcher::{MessageMatcher, Predicate};

/// Ordering discipline of an expectation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ordering {
    /// Satisfied in declaration order
    #[default]
    Strict,
    /// Satisfied in any order
    Partial,
    /// Must never be called
    Unreceived,
}

impl fmt::Display for Ordering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordering::Strict => write!(f, "STRICT"),
            Ordering::Partial => write!(f, "PARTIAL"),
            Ordering::Unreceived => write!(f, "UNRECEIVED"),
        }
    }
}

/// What a mock endpoint does once a call satisfied its expectation
#[derive(Clone, Debug, PartialEq)]
pub enum MockResponse {
    /// Reply to a request-response call
    Reply(Reply),
    /// Accept a fire-and-forget call without replying
    Accept,
}

#[derive(Clone, Debug)]
pub struct MockExpectation {
    pub(crate) address: Address,
    pub(crate) matcher: MessageMatcher,
    pub(crate) response: MockResponse,
    pub(crate) ordering: Ordering,
    pub(crate) repeat: u32,
    pub(crate) delay: Option<Duration>,
}

impl MockExpectation {
    /// Expect a request-response call at `address`
    pub fn sync<S: Into<String>>(address: S) -> ExpectationBuilder {
        ExpectationBuilder::new(address.into(), ExpectationKind::Sync)
    }

    /// Expect a fire-and-forget message at `address`
    pub fn asynchronous<S: Into<String>>(address: S) -> ExpectationBuilder {
        ExpectationBuilder::new(address.into(), ExpectationKind::Async)
    }

    /// Expect that nothing ever arrives at `address`
    pub fn unreceived<S: Into<String>>(address: S) -> ExpectationBuilder {
        ExpectationBuilder::new(address.into(), ExpectationKind::Unreceived)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn matcher(&self) -> &MessageMatcher {
        &self.matcher
    }

    pub fn response(&self) -> &MockResponse {
        &self.response
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExpectationKind {
    Sync,
    Async,
    Unreceived,
}

#[derive(Clone, Debug)]
enum BodySpec {
    Structural(Payload),
    Exact(Payload),
    Pattern(String),
    Predicate(Predicate),
}

/// Builder for [`MockExpectation`]
///
/// Mistakes are collected and reported together when the owning scenario is
/// built, so declarations read as one chain.
#[derive(Clone, Debug)]
pub struct ExpectationBuilder {
    address: String,
    kind: ExpectationKind,
    body: Option<BodySpec>,
    headers: Headers,
    response_body: Option<Payload>,
    response_headers: Headers,
    response_fault: Option<Fault>,
    ordering: Option<Ordering>,
    repeat: Option<u32>,
    delay: Option<Duration>,
}

impl ExpectationBuilder {
    fn new(address: String, kind: ExpectationKind) -> Self {
        Self {
            address,
            kind,
            body: None,
            headers: Headers::new(),
            response_body: None,
            response_headers: Headers::new(),
            response_fault: None,
            ordering: None,
            repeat: None,
            delay: None,
        }
    }

    /// Structural body expectation (JSON/XML canonical equality, text equality)
    pub fn expected_body(mut self, payload: Payload) -> Self {
        self.body = Some(BodySpec::Structural(payload));
        self
    }

    /// Byte-for-byte body expectation
    pub fn expected_exact_body(mut self, payload: Payload) -> Self {
        self.body = Some(BodySpec::Exact(payload));
        self
    }

    /// Regular expression the raw body must match
    pub fn expected_body_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.body = Some(BodySpec::Pattern(pattern.into()));
        self
    }

    pub fn expected_predicate(mut self, predicate: Predicate) -> Self {
        self.body = Some(BodySpec::Predicate(predicate));
        self
    }

    pub fn expected_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Canned success body returned to the caller
    pub fn response_body(mut self, payload: Payload) -> Self {
        self.response_body = Some(payload);
        self
    }

    pub fn response_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.response_headers.insert(key, value);
        self
    }

    /// Canned structured error returned to the caller
    pub fn response_fault(mut self, fault: Fault) -> Self {
        self.response_fault = Some(fault);
        self
    }

    pub fn ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Number of calls this expectation absorbs (default 1)
    pub fn repeat(mut self, count: u32) -> Self {
        self.repeat = Some(count);
        self
    }

    /// Artificial delay before the endpoint answers
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn build(self) -> Result<MockExpectation, Vec<String>> {
        let mut errors = Vec::new();
        let label = format!("expectation at '{}'", self.address);

        let address = match Address::parse(&self.address) {
            Ok(address) => Some(address),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        let matcher = match self.body {
            None => Ok(MessageMatcher::any()),
            Some(BodySpec::Structural(payload)) => MessageMatcher::structural(&payload),
            Some(BodySpec::Exact(payload)) => Ok(MessageMatcher::exact(payload)),
            Some(BodySpec::Pattern(pattern)) => MessageMatcher::pattern(&pattern),
            Some(BodySpec::Predicate(predicate)) => Ok(MessageMatcher::predicate(predicate)),
        };
        let matcher = match matcher {
            Ok(mut matcher) => {
                matcher.headers = self.headers;
                Some(matcher)
            }
            Err(e) => {
                errors.push(format!("{label}: expected body is invalid: {e}"));
                None
            }
        };

        if self.response_body.is_some() && self.response_fault.is_some() {
            errors.push(format!("{label}: declares both a response body and a response fault"));
        }

        let repeat = self.repeat.unwrap_or(1);
        if repeat == 0 {
            errors.push(format!("{label}: repeat count must be at least 1"));
        }

        let ordering = match self.kind {
            ExpectationKind::Unreceived => {
                if self.ordering.is_some_and(|o| o != Ordering::Unreceived) {
                    errors.push(format!("{label}: unreceived expectations cannot take another ordering"));
                }
                if self.response_body.is_some() || self.response_fault.is_some() {
                    errors.push(format!("{label}: unreceived expectations cannot declare a response"));
                }
                if self.repeat.is_some() {
                    errors.push(format!("{label}: unreceived expectations cannot declare a repeat count"));
                }
                Ordering::Unreceived
            }
            ExpectationKind::Async => {
                if self.response_body.is_some() || self.response_fault.is_some() {
                    errors.push(format!("{label}: fire-and-forget expectations cannot reply"));
                }
                self.ordering.unwrap_or_default()
            }
            ExpectationKind::Sync => self.ordering.unwrap_or_default(),
        };

        if self.kind != ExpectationKind::Unreceived && ordering == Ordering::Unreceived {
            errors.push(format!("{label}: use MockExpectation::unreceived for calls that must not happen"));
        }

        let response = match self.kind {
            ExpectationKind::Sync => match self.response_fault {
                Some(fault) => MockResponse::Reply(Reply::Fault(fault)),
                None => MockResponse::Reply(Reply::Success(Message::with_headers(
                    self.response_body.unwrap_or_default(),
                    self.response_headers,
                ))),
            },
            ExpectationKind::Async | ExpectationKind::Unreceived => MockResponse::Accept,
        };

        match (address, matcher) {
            (Some(address), Some(matcher)) if errors.is_empty() => Ok(MockExpectation {
                address,
                matcher,
                response,
                ordering,
                repeat,
                delay: self.delay,
            }),
            _ => Err(errors),
        }
    }
}
