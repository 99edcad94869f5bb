//! Scenario Builder
//!
//! Provides a fluent builder for declaring scenarios; all validation happens
//! in [`ScenarioBuilder::build`].

use shared::{Address, Headers, Message, Payload};
use std::collections::HashMap;
use std::time::Duration;

use super::expectation::{ExpectationBuilder, Ordering};
use super::{ExpectedOutcome, FaultExpectation, Mode, Scenario};
use crate::engine::matcher::MessageMatcher;
use crate::error::{HarnessError, HarnessResult};

#[derive(Clone, Debug)]
enum ReplySpec {
    Body(Payload),
    Matcher(MessageMatcher),
    Fault {
        status: Option<u16>,
        code: Option<String>,
        body: Option<Payload>,
    },
}

pub struct ScenarioBuilder {
    mode: Mode,
    address: String,
    name: String,
    request: Payload,
    request_headers: Headers,
    reply: Option<ReplySpec>,
    expectations: Vec<ExpectationBuilder>,
    timeout: Option<Duration>,
    reply_timeout: Option<Duration>,
    quiet_period: Option<Duration>,
}

impl ScenarioBuilder {
    pub(crate) fn new(mode: Mode, address: String, name: String) -> Self {
        Self {
            mode,
            address,
            name,
            request: Payload::default(),
            request_headers: Headers::new(),
            reply: None,
            expectations: Vec::new(),
            timeout: None,
            reply_timeout: None,
            quiet_period: None,
        }
    }

    /// Body of the initiating request
    pub fn request_body(mut self, payload: Payload) -> Self {
        self.request = payload;
        self
    }

    /// Body of the initiating fire-and-forget message
    pub fn input_message(self, payload: Payload) -> Self {
        self.request_body(payload)
    }

    pub fn request_header<K: AsRef<str>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.request_headers.insert(key, value);
        self
    }

    /// Expected success reply, compared structurally
    pub fn expected_response_body(mut self, payload: Payload) -> Self {
        self.reply = Some(ReplySpec::Body(payload));
        self
    }

    /// Expected success reply with a custom matcher
    pub fn expected_response(mut self, matcher: MessageMatcher) -> Self {
        self.reply = Some(ReplySpec::Matcher(matcher));
        self
    }

    /// Expect any structured exception
    pub fn expects_exception_response(mut self) -> Self {
        if !matches!(self.reply, Some(ReplySpec::Fault { .. })) {
            self.reply = Some(ReplySpec::Fault {
                status: None,
                code: None,
                body: None,
            });
        }
        self
    }

    /// Expect an exception with this status
    pub fn expected_fault_status(mut self, status: u16) -> Self {
        self = self.expects_exception_response();
        if let Some(ReplySpec::Fault { status: slot, .. }) = &mut self.reply {
            *slot = Some(status);
        }
        self
    }

    /// Expect an exception with this application code
    pub fn expected_fault_code<S: Into<String>>(mut self, code: S) -> Self {
        self = self.expects_exception_response();
        if let Some(ReplySpec::Fault { code: slot, .. }) = &mut self.reply {
            *slot = Some(code.into());
        }
        self
    }

    /// Expect an exception whose body matches structurally
    pub fn expected_fault_body(mut self, payload: Payload) -> Self {
        self = self.expects_exception_response();
        if let Some(ReplySpec::Fault { body: slot, .. }) = &mut self.reply {
            *slot = Some(payload);
        }
        self
    }

    pub fn add_expectation(mut self, expectation: ExpectationBuilder) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// Overall timeout; bounds every wait in the run
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for the synchronous reply; capped by the overall timeout
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }

    /// How long UNRECEIVED expectations are watched once everything else settled
    pub fn quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = Some(period);
        self
    }

    /// Validate the declaration and produce an immutable scenario
    pub fn build(self) -> HarnessResult<Scenario> {
        let mut errors: Vec<String> = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("scenario name is empty".to_string());
        }

        let address = match Address::parse(&self.address) {
            Ok(address) => Some(address),
            Err(e) => {
                errors.push(format!("initiating {e}"));
                None
            }
        };

        for (label, value) in [
            ("timeout", self.timeout),
            ("reply timeout", self.reply_timeout),
            ("quiet period", self.quiet_period),
        ] {
            if value.is_some_and(|d| d.is_zero()) {
                errors.push(format!("{label} must be greater than zero"));
            }
        }

        let expected = match self.reply {
            None => ExpectedOutcome::None,
            Some(ReplySpec::Matcher(matcher)) => ExpectedOutcome::Success(matcher),
            Some(ReplySpec::Body(payload)) => match MessageMatcher::structural(&payload) {
                Ok(matcher) => ExpectedOutcome::Success(matcher),
                Err(e) => {
                    errors.push(format!("expected response body is invalid: {e}"));
                    ExpectedOutcome::None
                }
            },
            Some(ReplySpec::Fault { status, code, body }) => {
                let body = match body.map(|payload| MessageMatcher::structural(&payload)).transpose() {
                    Ok(body) => body,
                    Err(e) => {
                        errors.push(format!("expected fault body is invalid: {e}"));
                        None
                    }
                };
                ExpectedOutcome::Fault(FaultExpectation { status, code, body })
            }
        };

        if self.mode == Mode::Asynchronous {
            if !matches!(expected, ExpectedOutcome::None) {
                errors.push("asynchronous scenarios have no reply to assert".to_string());
            }
            if self.reply_timeout.is_some() {
                errors.push("asynchronous scenarios have no reply to wait for".to_string());
            }
        }

        let mut expectations = Vec::with_capacity(self.expectations.len());
        for builder in self.expectations {
            match builder.build() {
                Ok(expectation) => expectations.push(expectation),
                Err(mut reasons) => errors.append(&mut reasons),
            }
        }

        // Each mock address belongs to exactly one ordering group
        let mut disciplines: HashMap<&Address, Ordering> = HashMap::new();
        for expectation in &expectations {
            if address.as_ref() == Some(&expectation.address) {
                errors.push(format!(
                    "mock address {} is also the initiating address",
                    expectation.address
                ));
            }
            match disciplines.get(&expectation.address) {
                Some(existing) if *existing != expectation.ordering => errors.push(format!(
                    "mock address {} is declared both {} and {}",
                    expectation.address, existing, expectation.ordering
                )),
                Some(_) => {}
                None => {
                    disciplines.insert(&expectation.address, expectation.ordering);
                }
            }
        }

        // Distinct addresses must not share one transport endpoint
        let mut endpoints: HashMap<String, &Address> = HashMap::new();
        for &mock in disciplines.keys() {
            if let Some(other) = endpoints.insert(mock.endpoint_key(), mock) {
                errors.push(format!(
                    "mock addresses {} and {} differ only in query or fragment and share one endpoint",
                    other.min(mock),
                    other.max(mock)
                ));
            }
        }

        if !errors.is_empty() {
            return Err(HarnessError::configuration(self.name, errors.join("; ")));
        }

        let Some(address) = address else {
            return Err(HarnessError::configuration(self.name, "initiating address is invalid"));
        };

        Ok(Scenario {
            name: self.name,
            mode: self.mode,
            address,
            request: Message::with_headers(self.request, self.request_headers),
            expected,
            expectations,
            timeout: self.timeout,
            reply_timeout: self.reply_timeout,
            quiet_period: self.quiet_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::MockExpectation;
    use assert_matches::assert_matches;

    fn ping() -> Payload {
        Payload::json(r#"{"request":"PING"}"#)
    }

    #[test]
    fn test_sync_scenario_builds() {
        let scenario = Scenario::sync("mem:pingService", "Simple JSON PING")
            .request_body(ping())
            .request_header("X-Test", "1")
            .expected_response_body(Payload::json(r#"{"response":"PONG"}"#))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        assert_eq!(scenario.name(), "Simple JSON PING");
        assert_eq!(scenario.mode(), Mode::Synchronous);
        assert_eq!(scenario.request().headers.get("x-test"), Some("1"));
        assert_matches!(scenario.expected(), ExpectedOutcome::Success(_));
        assert_eq!(scenario.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_fault_expectation_accumulates_constraints() {
        let scenario = Scenario::sync("mem:pingServiceProxy", "invalid ping")
            .request_body(ping())
            .expected_fault_status(500)
            .expected_fault_code("INVALID_REQUEST")
            .build()
            .unwrap();

        assert_matches!(
            scenario.expected(),
            ExpectedOutcome::Fault(FaultExpectation { status: Some(500), code: Some(code), body: None })
                if code == "INVALID_REQUEST"
        );
    }

    #[test]
    fn test_mock_addresses_are_distinct_and_ordered() {
        let scenario = Scenario::sync("mem:proxy", "repeat calls")
            .add_expectation(MockExpectation::sync("mem:b"))
            .add_expectation(MockExpectation::sync("mem:a"))
            .add_expectation(MockExpectation::sync("mem:b"))
            .build()
            .unwrap();

        let addresses: Vec<String> = scenario.mock_addresses().iter().map(|a| a.to_string()).collect();
        assert_eq!(addresses, vec!["mem:b", "mem:a"]);
    }

    #[test]
    fn test_async_scenario_cannot_assert_reply() {
        let err = Scenario::asynchronous("vm:test.input", "async with reply")
            .input_message(Payload::xml("<SystemField>foo</SystemField>"))
            .expected_response_body(Payload::xml("<x/>"))
            .build()
            .unwrap_err();
        assert_matches!(err, HarnessError::Configuration { reason, .. } if reason.contains("no reply to assert"));
    }

    #[test]
    fn test_address_in_two_disciplines_is_rejected() {
        let err = Scenario::sync("mem:proxy", "mixed")
            .add_expectation(MockExpectation::sync("mem:target"))
            .add_expectation(MockExpectation::sync("mem:target").ordering(Ordering::Partial))
            .build()
            .unwrap_err();
        assert_matches!(err, HarnessError::Configuration { reason, .. } if reason.contains("both STRICT and PARTIAL"));
    }

    #[test]
    fn test_addresses_sharing_an_endpoint_are_rejected() {
        let err = Scenario::sync("http://localhost:8090/services/pingServiceProxy", "wsdl query")
            .add_expectation(MockExpectation::sync("http://localhost:9090/services/targetWS?wsdlURL=a.wsdl"))
            .add_expectation(MockExpectation::sync("http://localhost:9090/services/targetWS?wsdlURL=b.wsdl"))
            .build()
            .unwrap_err();
        assert_matches!(err, HarnessError::Configuration { reason, .. } if reason.contains("share one endpoint"));

        // Opaque addresses are routed whole
        assert!(
            Scenario::sync("mem:proxy", "queues")
                .add_expectation(MockExpectation::sync("vm:queue.a"))
                .add_expectation(MockExpectation::sync("vm:queue.b"))
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_configuration_errors_are_reported_together() {
        let err = Scenario::sync("", " ")
            .expected_response_body(Payload::xml("<unclosed>"))
            .timeout(Duration::ZERO)
            .add_expectation(MockExpectation::sync("mem:target").repeat(0))
            .build()
            .unwrap_err();

        match err {
            HarnessError::Configuration { reason, .. } => {
                assert!(reason.contains("scenario name is empty"));
                assert!(reason.contains("initiating"));
                assert!(reason.contains("timeout must be greater than zero"));
                assert!(reason.contains("expected response body is invalid"));
                assert!(reason.contains("repeat count must be at least 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mock_cannot_share_initiating_address() {
        let err = Scenario::sync("mem:loop", "self call")
            .add_expectation(MockExpectation::sync("mem:loop"))
            .build()
            .unwrap_err();
        assert_matches!(err, HarnessError::Configuration { reason, .. } if reason.contains("also the initiating address"));
    }
}
