//! Scenario definitions (the expectation set)
//!
//! A [`Scenario`] is one complete test case: the initiating call, what the
//! system under test should answer, and the mock expectations it should
//! satisfy along the way. Scenarios are validated when built and never change
//! afterwards; the same scenario can be run any number of times.

pub mod builder;
pub mod expectation;

pub use builder::ScenarioBuilder;
pub use expectation::{ExpectationBuilder, MockExpectation, MockResponse, Ordering};

use serde::{Deserialize, Serialize};
use shared::{Address, Message};
use std::fmt;
use std::time::Duration;

use crate::engine::matcher::MessageMatcher;

/// Interaction style of the initiating call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Request-response: the runner waits for and validates the reply
    Synchronous,
    /// Fire-and-forget: the runner only validates mock traffic
    Asynchronous,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Synchronous => write!(f, "sync"),
            Mode::Asynchronous => write!(f, "async"),
        }
    }
}

/// Constraints on an expected structured exception; unset fields accept anything
#[derive(Clone, Debug, Default)]
pub struct FaultExpectation {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub body: Option<MessageMatcher>,
}

/// What the initiating call should produce
#[derive(Clone, Debug, Default)]
pub enum ExpectedOutcome {
    /// No assertion on the reply
    #[default]
    None,
    Success(MessageMatcher),
    Fault(FaultExpectation),
}

#[derive(Clone, Debug)]
pub struct Scenario {
    pub(crate) name: String,
    pub(crate) mode: Mode,
    pub(crate) address: Address,
    pub(crate) request: Message,
    pub(crate) expected: ExpectedOutcome,
    pub(crate) expectations: Vec<MockExpectation>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) reply_timeout: Option<Duration>,
    pub(crate) quiet_period: Option<Duration>,
}

impl Scenario {
    /// Start a request-response scenario against `address`
    pub fn sync<A: Into<String>, N: Into<String>>(address: A, name: N) -> ScenarioBuilder {
        ScenarioBuilder::new(Mode::Synchronous, address.into(), name.into())
    }

    /// Start a fire-and-forget scenario against `address`
    pub fn asynchronous<A: Into<String>, N: Into<String>>(address: A, name: N) -> ScenarioBuilder {
        ScenarioBuilder::new(Mode::Asynchronous, address.into(), name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn request(&self) -> &Message {
        &self.request
    }

    pub fn expected(&self) -> &ExpectedOutcome {
        &self.expected
    }

    pub fn expectations(&self) -> &[MockExpectation] {
        &self.expectations
    }

    /// Scenario-specific overall timeout (the runner default applies otherwise)
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout
    }

    pub fn quiet_period(&self) -> Option<Duration> {
        self.quiet_period
    }

    /// Distinct mock addresses in declaration order
    pub fn mock_addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = Vec::new();
        for expectation in &self.expectations {
            if !addresses.contains(&expectation.address) {
                addresses.push(expectation.address.clone());
            }
        }
        addresses
    }
}
