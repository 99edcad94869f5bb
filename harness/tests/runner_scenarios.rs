//! End-to-end runs of the scenario runner against scripted services on the
//! in-memory bus

mod common;

use assert_matches::assert_matches;
use common::{address, init_test_tracing, runner, serve};
use harness::{Cause, CauseKind, GroupState, MemoryBus, MockExpectation, Ordering, Outcome, Router, Scenario};
use shared::{Fault, Message, Payload, Reply};
use std::time::Duration;

fn ping() -> Payload {
    Payload::json(r#"{"request":"PING"}"#)
}

fn pong() -> Payload {
    Payload::json(r#"{"response":"PONG"}"#)
}

async fn forward(bus: &MemoryBus, target: &str, message: Message) -> Reply {
    match bus.send(&address(target), message).await {
        Ok(reply) => reply,
        Err(e) => Reply::Fault(Fault::new(502).with_body(Payload::text(e.to_string()))),
    }
}

#[tokio::test]
async fn test_sync_without_mocks_passes_on_expected_reply() {
    init_test_tracing();
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingService", |_, _| async { Some(Reply::success(pong())) }).await;

    let scenario = Scenario::sync("mem:pingService", "Simple JSON PING")
        .request_body(ping())
        .expected_response_body(Payload::json(r#"{ "response": "PONG" }"#))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
    assert_eq!(verdict.reply, Some(Reply::success(pong())));
}

#[tokio::test]
async fn test_sync_reply_mismatch_fails() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingService", |_, _| async {
        Some(Reply::success(Payload::json(r#"{"response":"PANG"}"#)))
    })
    .await;

    let scenario = Scenario::sync("mem:pingService", "PANG reply")
        .request_body(ping())
        .expected_response_body(pong())
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Failed);
    assert!(verdict.has_cause(CauseKind::MatchMismatch));
    assert_matches!(&verdict.causes[..], [Cause::ReplyMismatch { differences }] if differences[0].starts_with("$.response"));
}

#[tokio::test]
async fn test_mock_never_called_times_out() {
    let bus = MemoryBus::new();
    // Answers directly instead of consulting the target
    serve(&bus, "mem:pingServiceProxy", |_, _| async { Some(Reply::success(pong())) }).await;

    let scenario = Scenario::sync("mem:pingServiceProxy", "target skipped")
        .request_body(ping())
        .expected_response_body(pong())
        .add_expectation(
            MockExpectation::sync("mem:targetWS")
                .expected_body(ping())
                .response_body(pong()),
        )
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::TimedOut);
    assert_matches!(
        &verdict.causes[..],
        [Cause::Unmet { expectation, remaining: 1 }] if expectation.address.as_str() == "mem:targetWS"
    );
    assert_eq!(verdict.groups[0].state, GroupState::Pending);
}

#[tokio::test]
async fn test_missed_expectation_always_times_out_with_unmet_cause() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:shortcutProxy", |_, _| async { Some(Reply::success(pong())) }).await;

    // The endpoint window and the run deadline expire together
    let scenario = Scenario::sync("mem:shortcutProxy", "target skipped, short deadline")
        .request_body(ping())
        .add_expectation(MockExpectation::sync("mem:targetWS"))
        .timeout(Duration::from_millis(20))
        .build()
        .unwrap();

    let runner = runner(&bus);
    for attempt in 0..100 {
        let verdict = runner.run(&scenario).await;
        assert_eq!(verdict.outcome, Outcome::TimedOut, "attempt {attempt}: {}", verdict.cause_summary());
        assert_matches!(
            &verdict.causes[..],
            [Cause::Unmet { expectation, remaining: 1 }] if expectation.address.as_str() == "mem:targetWS",
            "attempt {attempt}"
        );
        assert_eq!(verdict.groups[0].state, GroupState::Pending);
    }
}

#[tokio::test]
async fn test_proxy_passes_through_mock_response() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingServiceProxy", |bus, message| async move {
        Some(forward(&bus, "mem:targetWS", message).await)
    })
    .await;

    let scenario = Scenario::sync("mem:pingServiceProxy", "proxy")
        .request_body(ping())
        .expected_response_body(pong())
        .add_expectation(
            MockExpectation::sync("mem:targetWS")
                .expected_body(ping())
                .response_body(pong()),
        )
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
    assert_eq!(verdict.observed.len(), 1);
    assert_eq!(verdict.observed[0].address.as_str(), "mem:targetWS");

    // Endpoints are released whatever the outcome
    assert!(!bus.is_bound(&address("mem:targetWS")));
}

#[tokio::test]
async fn test_partial_group_accepts_any_order() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingServiceMultiProxyUnordered", |bus, message| async move {
        let (b, c) = tokio::join!(
            forward(&bus, "mem:targetB", message.clone()),
            forward(&bus, "mem:targetC", message)
        );
        match (b, c) {
            (Reply::Success(_), Reply::Success(_)) => Some(Reply::success(pong())),
            _ => Some(Reply::Fault(Fault::new(500))),
        }
    })
    .await;

    let scenario = Scenario::sync("mem:pingServiceMultiProxyUnordered", "unordered fan-out")
        .request_body(ping())
        .expected_response_body(pong())
        .add_expectation(
            MockExpectation::sync("mem:targetC")
                .ordering(Ordering::Partial)
                .delay(Duration::from_millis(20)),
        )
        .add_expectation(MockExpectation::sync("mem:targetB").ordering(Ordering::Partial))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
    assert_eq!(verdict.groups[0].ordering, Ordering::Partial);
    assert_eq!(verdict.groups[0].calls, 2);
}

#[tokio::test]
async fn test_partial_group_missing_member_times_out() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:halfProxy", |bus, message| async move {
        Some(forward(&bus, "mem:targetB", message).await)
    })
    .await;

    let scenario = Scenario::sync("mem:halfProxy", "half fan-out")
        .request_body(ping())
        .add_expectation(MockExpectation::sync("mem:targetB").ordering(Ordering::Partial))
        .add_expectation(MockExpectation::sync("mem:targetC").ordering(Ordering::Partial))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::TimedOut);
    assert_eq!(verdict.causes.len(), 1);
    assert_eq!(verdict.causes[0].address().map(|a| a.as_str()), Some("mem:targetC"));
    assert_eq!(verdict.groups[0].state, GroupState::InProgress);
}

#[tokio::test]
async fn test_strict_group_in_sequence_passes() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingServiceMultiProxy", |bus, message| async move {
        forward(&bus, "mem:targetB", message.clone()).await;
        Some(forward(&bus, "mem:targetC", message).await)
    })
    .await;

    let scenario = Scenario::sync("mem:pingServiceMultiProxy", "sequential fan-out")
        .request_body(ping())
        .expected_response_body(pong())
        .add_expectation(MockExpectation::sync("mem:targetB").expected_body(ping()))
        .add_expectation(
            MockExpectation::sync("mem:targetC")
                .expected_body(ping())
                .response_body(pong()),
        )
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
}

#[tokio::test]
async fn test_strict_group_out_of_order_fails_fast() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:reversedProxy", |bus, message| async move {
        forward(&bus, "mem:targetC", message.clone()).await;
        Some(forward(&bus, "mem:targetB", message).await)
    })
    .await;

    let scenario = Scenario::sync("mem:reversedProxy", "reversed fan-out")
        .request_body(ping())
        .add_expectation(MockExpectation::sync("mem:targetB"))
        .add_expectation(MockExpectation::sync("mem:targetC"))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Failed);
    assert!(verdict.has_cause(CauseKind::OrderingViolation));
    assert_matches!(&verdict.causes[0], Cause::OutOfOrder { expected, received, .. }
        if expected.address.as_str() == "mem:targetB" && received.address.as_str() == "mem:targetC");
    assert!(verdict.elapsed_ms < 2000);
}

#[tokio::test]
async fn test_unreceived_passes_when_proxy_rejects_invalid_request() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:validatingProxy", |_, _| async {
        Some(Reply::Fault(Fault::new(500).with_code("INVALID_REQUEST")))
    })
    .await;

    let scenario = Scenario::sync("mem:validatingProxy", "invalid ping")
        .request_body(Payload::json(r#"{"request":"PANG"}"#))
        .expected_fault_status(500)
        .expected_fault_code("INVALID_REQUEST")
        .add_expectation(MockExpectation::unreceived("mem:targetWS"))
        .quiet_period(Duration::from_millis(100))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
    assert_eq!(verdict.groups[0].state, GroupState::Satisfied);
    assert!(verdict.elapsed_ms < 500);
}

#[tokio::test]
async fn test_unreceived_call_fails_even_when_reply_matches() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:leakyProxy", |bus, message| async move {
        // The forbidden endpoint answers 404; the proxy still reports the exception
        forward(&bus, "mem:targetWS", message).await;
        Some(Reply::Fault(Fault::new(500).with_code("INVALID_REQUEST")))
    })
    .await;

    let scenario = Scenario::sync("mem:leakyProxy", "leaky proxy")
        .request_body(ping())
        .expected_fault_code("INVALID_REQUEST")
        .add_expectation(MockExpectation::unreceived("mem:targetWS"))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Failed);
    assert_matches!(&verdict.causes[..], [Cause::Forbidden { .. }]);
    assert_eq!(verdict.causes[0].kind(), CauseKind::OrderingViolation);
}

#[tokio::test]
async fn test_async_transformation_reaches_output_queue() {
    let bus = MemoryBus::new();
    serve(&bus, "vm:test.input", |bus, message| async move {
        let transformed = message.body().replace("SystemField", "CanonicalField");
        let _ = bus
            .post(&address("vm:test.output"), Message::new(Payload::xml(transformed)))
            .await;
        None
    })
    .await;

    let scenario = Scenario::asynchronous("vm:test.input", "canonicaliser")
        .input_message(Payload::xml("<SystemField>foo</SystemField>"))
        .add_expectation(
            MockExpectation::asynchronous("vm:test.output")
                .expected_exact_body(Payload::xml("<CanonicalField>foo</CanonicalField>")),
        )
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::Passed, "{}", verdict.cause_summary());
    assert!(verdict.reply.is_none());
    assert!(!verdict.observed[0].expects_reply);
}

#[tokio::test]
async fn test_silent_service_hits_reply_timeout() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:blackHole", |_, _| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        None
    })
    .await;

    let scenario = Scenario::sync("mem:blackHole", "no reply")
        .request_body(ping())
        .reply_timeout(Duration::from_millis(100))
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let verdict = runner(&bus).run(&scenario).await;
    assert_eq!(verdict.outcome, Outcome::TimedOut);
    assert_matches!(&verdict.causes[..], [Cause::ReplyTimeout { waited_ms }] if *waited_ms < 2000);
}

#[tokio::test]
async fn test_repeated_runs_are_independent() {
    let bus = MemoryBus::new();
    serve(&bus, "mem:pingServiceProxy", |bus, message| async move {
        Some(forward(&bus, "mem:targetWS", message).await)
    })
    .await;

    let scenario = Scenario::sync("mem:pingServiceProxy", "twice")
        .request_body(ping())
        .expected_response_body(pong())
        .add_expectation(MockExpectation::sync("mem:targetWS").response_body(pong()))
        .build()
        .unwrap();

    let runner = runner(&bus);
    let first = runner.run(&scenario).await;
    let second = runner.run(&scenario).await;
    assert_eq!(first.outcome, Outcome::Passed, "{}", first.cause_summary());
    assert_eq!(second.outcome, first.outcome);
    assert_eq!(second.observed.len(), 1);
    assert_ne!(first.observed[0].id, second.observed[0].id);
}
