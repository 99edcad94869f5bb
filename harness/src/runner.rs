//! Scenario Runner
//!
//! Drives one scenario run: binds the mock endpoints, dispatches the
//! initiating call through the routing collaborator, waits (bounded by the
//! scenario deadline) for the reply and for every ordering group, releases
//! every endpoint, and composes the verdict.

use futures_util::future::join_all;
use shared::logging::{log_error, log_scenario_start, log_success};
use shared::{Address, Message, ObservedCall, Reply, scenario_debug, scenario_error, scenario_info, scenario_warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RunnerConfig;
use crate::engine::ordering::OrderingCoordinator;
use crate::engine::verdict::{Cause, Outcome, Verdict};
use crate::error::HarnessError;
use crate::mock::MockEndpoint;
use crate::scenario::{ExpectedOutcome, Mode, Ordering, Scenario};
use crate::traits::Router;

/// Result of the initiating call
#[derive(Debug)]
enum DispatchOutcome {
    Reply(Reply),
    Posted,
    NoReply(Duration),
    Failed(HarnessError),
}

#[derive(Debug, Default)]
struct Exchange {
    causes: Vec<Cause>,
    reply: Option<Reply>,
    timed_out: bool,
}

pub struct ScenarioRunner {
    router: Arc<dyn Router>,
    config: RunnerConfig,
}

impl ScenarioRunner {
    pub fn new(router: Arc<dyn Router>, config: RunnerConfig) -> Self {
        Self { router, config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run `scenario` once against fresh endpoints
    ///
    /// Never fails: transport and binding problems become verdict causes.
    pub async fn run(&self, scenario: &Scenario) -> Verdict {
        let started = Instant::now();
        let timeout = scenario.timeout().unwrap_or(self.config.default_timeout);
        let deadline = started + timeout;

        log_scenario_start(
            scenario.name(),
            &format!(
                "{} scenario at {} with {} mock expectation(s), timeout {:?}",
                scenario.mode(),
                scenario.address(),
                scenario.expectations().len(),
                timeout
            ),
        );

        let coordinator = Arc::new(OrderingCoordinator::new(scenario));

        let endpoints = match self.bind_endpoints(scenario, &coordinator).await {
            Ok(endpoints) => endpoints,
            Err(cause) => {
                let verdict = Verdict::compose(scenario.name(), vec![cause], vec![], None, vec![], elapsed_ms(started));
                log_error(scenario.name(), "Binding mock endpoints", &verdict.cause_summary());
                return verdict;
            }
        };

        scenario_debug!(scenario.name(), "▶️ RUNNING with {} endpoint(s)", endpoints.len());
        let exchange = self.exchange(scenario, &coordinator, &endpoints, deadline).await;

        let observed = self.release(scenario, endpoints).await;
        let groups = coordinator.close(exchange.timed_out);
        let verdict = Verdict::compose(
            scenario.name(),
            exchange.causes,
            groups,
            exchange.reply,
            observed,
            elapsed_ms(started),
        );

        match verdict.outcome {
            Outcome::Passed => log_success(scenario.name(), &format!("PASSED in {}ms", verdict.elapsed_ms)),
            outcome => log_error(scenario.name(), &format!("Scenario ({outcome})"), &verdict.cause_summary()),
        }
        verdict
    }

    async fn bind_endpoints(
        &self,
        scenario: &Scenario,
        coordinator: &Arc<OrderingCoordinator>,
    ) -> Result<Vec<MockEndpoint>, Cause> {
        let mut endpoints = Vec::new();
        for address in scenario.mock_addresses() {
            match self.router.bind(&address).await {
                Ok(binding) => {
                    scenario_debug!(scenario.name(), "🔌 Bound mock endpoint at {}", address);
                    endpoints.push(MockEndpoint::start(binding, coordinator.clone()));
                }
                Err(e) => {
                    self.release(scenario, endpoints).await;
                    return Err(transport_cause(address, e));
                }
            }
        }
        Ok(endpoints)
    }

    async fn exchange(
        &self,
        scenario: &Scenario,
        coordinator: &OrderingCoordinator,
        endpoints: &[MockEndpoint],
        deadline: Instant,
    ) -> Exchange {
        let mut exchange = Exchange::default();
        let dispatched_at = Instant::now();

        let dispatch = self.dispatch(scenario, deadline);
        tokio::pin!(dispatch);

        let window = deadline.saturating_duration_since(Instant::now());
        let required = join_all(
            endpoints
                .iter()
                .filter(|e| e.ordering() != Ordering::Unreceived)
                .map(|e| e.await_satisfied(window)),
        );
        tokio::pin!(required);

        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);

        let mut dispatched = false;
        let mut settled = false;

        while !(dispatched && settled) {
            tokio::select! {
                outcome = &mut dispatch, if !dispatched => {
                    dispatched = true;
                    self.record_dispatch(scenario, outcome, &mut exchange);
                    if !exchange.causes.is_empty() {
                        return exchange;
                    }
                }
                reports = &mut required, if !settled => {
                    settled = true;
                    for report in reports.iter().filter(|r| !r.satisfied) {
                        scenario_debug!(scenario.name(), "Endpoint {} not satisfied ({} call(s))", report.address, report.calls.len());
                    }
                    if coordinator.any_violated() {
                        return exchange;
                    }
                    // The endpoint windows end at the deadline, so unmet groups mean the run expired
                    if !coordinator.required_met() {
                        self.time_out(scenario, dispatched, dispatched_at, &mut exchange);
                        return exchange;
                    }
                }
                _ = &mut expired => {
                    self.time_out(scenario, dispatched, dispatched_at, &mut exchange);
                    return exchange;
                }
            }
        }

        let unreceived: Vec<&MockEndpoint> = endpoints
            .iter()
            .filter(|e| e.ordering() == Ordering::Unreceived)
            .collect();
        if !unreceived.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let window = scenario
                .quiet_period()
                .or(self.config.quiet_period)
                .map_or(remaining, |period| period.min(remaining));
            scenario_debug!(scenario.name(), "👀 Watching {} unreceived endpoint(s) for {:?}", unreceived.len(), window);
            join_all(unreceived.iter().map(|e| e.await_satisfied(window))).await;
        }

        exchange
    }

    fn time_out(&self, scenario: &Scenario, dispatched: bool, dispatched_at: Instant, exchange: &mut Exchange) {
        scenario_warn!(scenario.name(), "⏰ Timed out after {}ms", elapsed_ms(dispatched_at));
        exchange.timed_out = true;
        if !dispatched && scenario.mode() == Mode::Synchronous {
            exchange.causes.push(Cause::ReplyTimeout { waited_ms: elapsed_ms(dispatched_at) });
        }
    }

    async fn dispatch(&self, scenario: &Scenario, deadline: Instant) -> DispatchOutcome {
        let address = scenario.address();
        let message = scenario.request().clone();

        match scenario.mode() {
            Mode::Synchronous => {
                let started = Instant::now();
                let reply_deadline = scenario
                    .reply_timeout()
                    .map_or(deadline, |wait| (started + wait).min(deadline));
                match tokio::time::timeout_at(reply_deadline, self.router.send(address, message)).await {
                    Ok(Ok(reply)) => DispatchOutcome::Reply(reply),
                    Ok(Err(e)) => DispatchOutcome::Failed(e),
                    Err(_) => DispatchOutcome::NoReply(started.elapsed()),
                }
            }
            Mode::Asynchronous => match self.router.post(address, message).await {
                Ok(()) => DispatchOutcome::Posted,
                Err(e) => DispatchOutcome::Failed(e),
            },
        }
    }

    fn record_dispatch(&self, scenario: &Scenario, outcome: DispatchOutcome, exchange: &mut Exchange) {
        match outcome {
            DispatchOutcome::Reply(reply) => {
                scenario_info!(scenario.name(), "📬 Reply received ({})", reply_label(&reply));
                exchange.causes.extend(evaluate_reply(scenario.expected(), &reply));
                exchange.reply = Some(reply);
            }
            DispatchOutcome::Posted => {
                scenario_debug!(scenario.name(), "📤 Message accepted at {}", scenario.address());
            }
            DispatchOutcome::NoReply(waited) => {
                exchange.causes.push(Cause::ReplyTimeout {
                    waited_ms: waited.as_millis() as u64,
                });
            }
            DispatchOutcome::Failed(e) => {
                scenario_error!(scenario.name(), "📭 Dispatch to {} failed: {}", scenario.address(), e);
                exchange.causes.push(transport_cause(scenario.address().clone(), e));
            }
        }
    }

    async fn release(&self, scenario: &Scenario, endpoints: Vec<MockEndpoint>) -> Vec<ObservedCall> {
        let mut observed = Vec::new();
        for endpoint in endpoints {
            let address = endpoint.address().clone();
            observed.extend(endpoint.stop().await);
            if let Err(e) = self.router.unbind(&address).await {
                scenario_warn!(scenario.name(), "Failed to release {}: {}", address, e);
            }
        }
        observed.sort_by_key(|call| call.received_at);
        observed
    }
}

/// Compare the initiator's reply against the expected outcome
pub fn evaluate_reply(expected: &ExpectedOutcome, reply: &Reply) -> Vec<Cause> {
    match (expected, reply) {
        (ExpectedOutcome::None, _) => Vec::new(),
        (ExpectedOutcome::Success(matcher), Reply::Success(message)) => match matcher.check(message) {
            Ok(()) => Vec::new(),
            Err(mismatch) => vec![Cause::ReplyMismatch {
                differences: mismatch.differences,
            }],
        },
        (ExpectedOutcome::Success(_), Reply::Fault(fault)) => vec![Cause::UnexpectedFault { fault: fault.clone() }],
        (ExpectedOutcome::Fault(_), Reply::Success(message)) => vec![Cause::MissingFault {
            body: message.body().to_string(),
        }],
        (ExpectedOutcome::Fault(expected), Reply::Fault(fault)) => {
            let mut differences = Vec::new();
            if let Some(status) = expected.status {
                if status != fault.status {
                    differences.push(format!("fault status: expected {status}, got {}", fault.status));
                }
            }
            if let Some(code) = &expected.code {
                if fault.code.as_ref() != Some(code) {
                    differences.push(format!("fault code: expected {code:?}, got {:?}", fault.code));
                }
            }
            if let Some(matcher) = &expected.body {
                let body = fault.body.clone().unwrap_or_default();
                if let Err(mismatch) = matcher.check(&Message::new(body)) {
                    differences.extend(mismatch.differences.into_iter().map(|d| format!("fault body: {d}")));
                }
            }
            if differences.is_empty() {
                Vec::new()
            } else {
                vec![Cause::ReplyMismatch { differences }]
            }
        }
    }
}

fn transport_cause(address: Address, error: HarnessError) -> Cause {
    let message = match error {
        HarnessError::Transport { message, .. } => message,
        other => other.to_string(),
    };
    Cause::Transport { address, message }
}

fn reply_label(reply: &Reply) -> String {
    match reply {
        Reply::Success(_) => "success".to_string(),
        Reply::Fault(fault) => fault.to_string(),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
