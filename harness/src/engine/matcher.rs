//! Message matching
//!
//! A [`MessageMatcher`] is an immutable expectation about a message: a body
//! matcher plus a set of required headers. Checking is pure, so endpoints can
//! run it concurrently without coordination.

use regex::Regex;
use serde::{Deserialize, Serialize};
use shared::{Headers, Message, Payload, SharedError, SharedResult};
use std::fmt;
use std::sync::Arc;

use crate::engine::canonical::{Canonical, to_canonical_form};

type PredicateFn = dyn Fn(&Message) -> Result<(), String> + Send + Sync;

/// Caller-supplied matching logic with a description for diagnostics
#[derive(Clone)]
pub struct Predicate {
    description: String,
    check: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<S, F>(description: S, check: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Message) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("description", &self.description).finish()
    }
}

/// How a message body is compared
#[derive(Clone, Debug, Default)]
pub enum BodyMatcher {
    /// Accept any body
    #[default]
    Any,
    /// Byte-for-byte text equality
    Exact(Payload),
    /// Structural equality of canonical forms
    Canonical(Canonical),
    /// Regular expression over the raw body
    Pattern(Regex),
    /// Custom logic
    Predicate(Predicate),
}

/// Result of a failed match: every difference found
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub differences: Vec<String>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.differences.join("; "))
    }
}

/// Expected message: body matcher plus required headers
#[derive(Clone, Debug, Default)]
pub struct MessageMatcher {
    pub body: BodyMatcher,
    pub headers: Headers,
}

impl MessageMatcher {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exact(payload: Payload) -> Self {
        Self {
            body: BodyMatcher::Exact(payload),
            headers: Headers::new(),
        }
    }

    /// Structural match for JSON/XML, exact match for text
    ///
    /// Fails when the expected payload itself is not well-formed.
    pub fn structural(payload: &Payload) -> SharedResult<Self> {
        let canonical = to_canonical_form(&payload.body, payload.content_type)?;
        Ok(Self {
            body: BodyMatcher::Canonical(canonical),
            headers: Headers::new(),
        })
    }

    pub fn pattern(pattern: &str) -> SharedResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| SharedError::InvalidConfig {
            field: "body pattern".to_string(),
            value: format!("{pattern} ({e})"),
        })?;
        Ok(Self {
            body: BodyMatcher::Pattern(regex),
            headers: Headers::new(),
        })
    }

    pub fn predicate(predicate: Predicate) -> Self {
        Self {
            body: BodyMatcher::Predicate(predicate),
            headers: Headers::new(),
        }
    }

    pub fn with_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn matches(&self, observed: &Message) -> bool {
        self.check(observed).is_ok()
    }

    /// Compare `observed` against this expectation, collecting every difference
    pub fn check(&self, observed: &Message) -> Result<(), Mismatch> {
        let mut differences = Vec::new();

        for (key, expected) in self.headers.iter() {
            match observed.headers.get(key) {
                None => differences.push(format!("header {key}: missing (expected {expected:?})")),
                Some(actual) if actual != expected => {
                    differences.push(format!("header {key}: expected {expected:?}, got {actual:?}"))
                }
                Some(_) => {}
            }
        }

        match &self.body {
            BodyMatcher::Any => {}
            BodyMatcher::Exact(payload) => {
                let expected = Canonical::Text(payload.body.clone());
                let actual = Canonical::Text(observed.body().to_string());
                differences.extend(expected.differences(&actual));
            }
            BodyMatcher::Canonical(expected) => {
                match to_canonical_form(observed.body(), expected.content_type()) {
                    Ok(actual) => differences.extend(expected.differences(&actual)),
                    Err(e) => differences.push(format!("observed body rejected: {e}")),
                }
            }
            BodyMatcher::Pattern(regex) => {
                if !regex.is_match(observed.body()) {
                    differences.push(format!("body does not match pattern /{regex}/"));
                }
            }
            BodyMatcher::Predicate(predicate) => {
                if let Err(reason) = (predicate.check)(observed) {
                    differences.push(format!(
                        "predicate '{}' rejected message: {reason}",
                        predicate.description
                    ));
                }
            }
        }

        if differences.is_empty() {
            Ok(())
        } else {
            Err(Mismatch { differences })
        }
    }
}
