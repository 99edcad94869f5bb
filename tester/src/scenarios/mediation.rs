//! Scenarios where the ESB calls out to mock endpoints

use harness::{HarnessResult, MockExpectation, Ordering, Scenario};
use shared::Payload;
use std::time::Duration;

use super::data_file;
use crate::fake_esb::EsbLayout;
use crate::fake_esb::services::ping_request;

/// How long the rejected request is watched for leaking through to the target
const REJECTION_QUIET_PERIOD: Duration = Duration::from_millis(500);

pub fn scenarios(layout: &EsbLayout) -> HarnessResult<Vec<Scenario>> {
    let request = data_file("pingRequest1.xml")?;
    let response = data_file("pingResponse1.xml")?;

    let target = |address: &str| {
        MockExpectation::sync(address)
            .expected_body(request.clone())
            .response_body(response.clone())
    };

    Ok(vec![
        Scenario::sync(
            layout.ping_service_proxy.as_str(),
            "WS PING test with mock service expectation",
        )
        .request_body(request.clone())
        .expected_response_body(response.clone())
        .add_expectation(target(layout.target_ws.as_str()))
        .build()?,
        Scenario::sync(
            layout.ping_service_multi_proxy.as_str(),
            "WS PING test with multiple mock service expectations",
        )
        .request_body(request.clone())
        .expected_response_body(response.clone())
        .add_expectation(target(layout.target_ws.as_str()))
        .add_expectation(target(layout.another_target_ws.as_str()))
        .build()?,
        Scenario::sync(
            layout.ping_service_multi_proxy_unordered.as_str(),
            "WS PING test with multiple unordered mock service expectations",
        )
        .request_body(request.clone())
        .expected_response_body(response.clone())
        .add_expectation(target(layout.target_ws.as_str()).ordering(Ordering::Partial))
        .add_expectation(target(layout.another_target_ws.as_str()).ordering(Ordering::Partial))
        .build()?,
        // The ESB validates and rejects, so the target must never see the message
        Scenario::sync(
            layout.ping_service_proxy.as_str(),
            "Test invalid message doesn't arrive at the endpoint and returns exception",
        )
        .request_body(ping_request("PONG"))
        .expects_exception_response()
        .add_expectation(MockExpectation::unreceived(layout.target_ws.as_str()))
        .quiet_period(REJECTION_QUIET_PERIOD)
        .build()?,
        Scenario::asynchronous(
            layout.input_queue.as_str(),
            "Simple Asynchronous Canonicalizer Comparison",
        )
        .input_message(Payload::xml("<SystemField>foo</SystemField>"))
        .add_expectation(
            MockExpectation::asynchronous(layout.output_queue.as_str())
                .expected_body(Payload::xml("<CanonicalField>foo</CanonicalField>")),
        )
        .build()?,
    ])
}
