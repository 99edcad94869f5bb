//! Mock endpoints
//!
//! A [`MockEndpoint`] owns one bound address for the lifetime of a scenario
//! run. Every inbound call is captured as an [`ObservedCall`], handed to the
//! [`OrderingCoordinator`], and answered with the canned response (or a
//! rejection fault) when the caller awaits a reply.

use serde::{Deserialize, Serialize};
use shared::{Address, ObservedCall, Reply};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::engine::ordering::{Disposition, OrderingCoordinator};
use crate::engine::verdict::Cause;
use crate::scenario::{MockResponse, Ordering};
use crate::traits::{Binding, InboundCall};

/// Per-endpoint result of [`MockEndpoint::await_satisfied`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndpointReport {
    pub address: Address,
    pub calls: Vec<ObservedCall>,
    pub satisfied: bool,
    pub causes: Vec<Cause>,
}

pub struct MockEndpoint {
    address: Address,
    ordering: Ordering,
    calls: Arc<Mutex<Vec<ObservedCall>>>,
    coordinator: Arc<OrderingCoordinator>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MockEndpoint {
    /// Start serving `binding` until [`MockEndpoint::stop`] is called
    pub fn start(binding: Binding, coordinator: Arc<OrderingCoordinator>) -> Self {
        let Binding { address, mut inbound } = binding;
        let ordering = coordinator.ordering_of(&address).unwrap_or_default();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = {
            let address = address.clone();
            let calls = calls.clone();
            let coordinator = coordinator.clone();

            tokio::spawn(async move {
                debug!("🎭 Mock endpoint listening at {}", address);
                // Delayed replies run beside the loop; dropping the set aborts them
                let mut delayed: JoinSet<()> = JoinSet::new();

                loop {
                    tokio::select! {
                        received = inbound.recv() => {
                            let Some(call) = received else {
                                debug!("Inbound stream for {} closed", address);
                                break;
                            };
                            Self::handle_call(&address, call, &calls, &coordinator, &mut delayed);
                        }
                        Some(_) = delayed.join_next(), if !delayed.is_empty() => {}
                        _ = &mut shutdown_rx => {
                            debug!("🛑 Mock endpoint at {} shutting down", address);
                            break;
                        }
                    }
                }
            })
        };

        Self {
            address,
            ordering,
            calls,
            coordinator,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    fn handle_call(
        address: &Address,
        call: InboundCall,
        calls: &Mutex<Vec<ObservedCall>>,
        coordinator: &OrderingCoordinator,
        delayed: &mut JoinSet<()>,
    ) {
        let InboundCall { message, reply_to } = call;
        let observed = ObservedCall::capture(address.clone(), message, reply_to.is_some());
        info!("📨 Call {} received at {}", observed.id, address);

        calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observed.clone());

        let (reply, delay) = match coordinator.observe(&observed) {
            Disposition::Respond {
                response: MockResponse::Reply(reply),
                delay,
                ..
            } => (Some(reply), delay),
            Disposition::Respond {
                response: MockResponse::Accept,
                delay,
                ..
            } => (None, delay),
            Disposition::Reject(fault) => (Some(Reply::Fault(fault)), None),
        };

        let Some(reply_to) = reply_to else {
            return;
        };

        // Dropping the sender leaves the caller without a body (an accept)
        match (reply, delay) {
            (Some(reply), Some(delay)) => {
                delayed.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = reply_to.send(reply);
                });
            }
            (Some(reply), None) => {
                if reply_to.send(reply).is_err() {
                    warn!("Caller at {} went away before the reply", address);
                }
            }
            (None, _) => drop(reply_to),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// Snapshot of the call log
    pub fn calls(&self) -> Vec<ObservedCall> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn settled(&self) -> bool {
        let Some(progress) = self.coordinator.endpoint_progress(&self.address) else {
            return true;
        };
        if progress.violated || self.coordinator.any_violated() {
            return true;
        }
        // UNRECEIVED endpoints only settle through a violation
        self.ordering != Ordering::Unreceived && progress.satisfied
    }

    /// Wait until this endpoint's expectations are met, any group of the run
    /// is violated, or `timeout` elapses
    ///
    /// UNRECEIVED endpoints wait out the whole window and report satisfied
    /// when nothing arrived.
    pub async fn await_satisfied(&self, timeout: Duration) -> EndpointReport {
        let mut changes = self.coordinator.subscribe();
        let wait = async {
            while !self.settled() {
                if changes.changed().await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait).await;
        self.report()
    }

    pub fn report(&self) -> EndpointReport {
        let (satisfied, causes) = match self.coordinator.endpoint_progress(&self.address) {
            Some(progress) => (progress.satisfied && !progress.violated, progress.causes),
            None => (false, Vec::new()),
        };
        EndpointReport {
            address: self.address.clone(),
            calls: self.calls(),
            satisfied,
            causes,
        }
    }

    /// Stop serving and return the call log
    pub async fn stop(mut self) -> Vec<ObservedCall> {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Mock endpoint task at {} ended abnormally: {}", self.address, e);
            }
        }
        self.calls()
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{MockExpectation, Scenario};
    use shared::{Message, Payload};
    use tokio::sync::mpsc;

    fn endpoint_for(scenario: &Scenario, address: &str) -> (MockEndpoint, mpsc::Sender<InboundCall>) {
        let (tx, rx) = mpsc::channel(8);
        let coordinator = Arc::new(OrderingCoordinator::new(scenario));
        let binding = Binding {
            address: Address::parse(address).unwrap(),
            inbound: rx,
        };
        (MockEndpoint::start(binding, coordinator), tx)
    }

    #[tokio::test]
    async fn test_replies_with_canned_response() {
        let scenario = Scenario::sync("mem:proxy", "canned")
            .add_expectation(
                MockExpectation::sync("mem:targetWS")
                    .expected_body(Payload::json(r#"{"request":"PING"}"#))
                    .response_body(Payload::json(r#"{"response":"PONG"}"#)),
            )
            .build()
            .unwrap();
        let (endpoint, tx) = endpoint_for(&scenario, "mem:targetWS");

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(InboundCall::request(
            Message::new(Payload::json(r#"{ "request": "PING" }"#)),
            reply_tx,
        ))
        .await
        .unwrap();

        let reply = reply_rx.await.unwrap();
        assert_eq!(reply, Reply::success(Payload::json(r#"{"response":"PONG"}"#)));

        let report = endpoint.await_satisfied(Duration::from_secs(1)).await;
        assert!(report.satisfied);
        assert_eq!(report.calls.len(), 1);
        assert!(report.calls[0].expects_reply);

        let calls = endpoint.stop().await;
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_unreceived_endpoint_answers_not_found() {
        let scenario = Scenario::sync("mem:proxy", "forbidden")
            .add_expectation(MockExpectation::unreceived("mem:targetWS"))
            .build()
            .unwrap();
        let (endpoint, tx) = endpoint_for(&scenario, "mem:targetWS");

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(InboundCall::request(Message::default(), reply_tx)).await.unwrap();

        match reply_rx.await.unwrap() {
            Reply::Fault(fault) => assert_eq!(fault.status, 404),
            other => panic!("expected a fault, got {other:?}"),
        }

        let report = endpoint.await_satisfied(Duration::from_millis(50)).await;
        assert!(!report.satisfied);
        assert_eq!(report.causes.len(), 1);
    }

    #[tokio::test]
    async fn test_unreceived_endpoint_waits_out_the_window() {
        let scenario = Scenario::sync("mem:proxy", "quiet")
            .add_expectation(MockExpectation::unreceived("mem:targetWS"))
            .build()
            .unwrap();
        let (endpoint, _tx) = endpoint_for(&scenario, "mem:targetWS");

        let started = tokio::time::Instant::now();
        let report = endpoint.await_satisfied(Duration::from_millis(50)).await;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(report.satisfied);
        assert!(report.calls.is_empty());
    }

    #[tokio::test]
    async fn test_fire_and_forget_call_is_accepted_silently() {
        let scenario = Scenario::asynchronous("vm:test.input", "async")
            .add_expectation(MockExpectation::asynchronous("vm:test.output"))
            .build()
            .unwrap();
        let (endpoint, tx) = endpoint_for(&scenario, "vm:test.output");

        tx.send(InboundCall::one_way(Message::new(Payload::xml("<a/>")))).await.unwrap();
        let report = endpoint.await_satisfied(Duration::from_secs(1)).await;
        assert!(report.satisfied);
        assert!(!report.calls[0].expects_reply);
    }

    #[tokio::test]
    async fn test_delayed_reply() {
        let scenario = Scenario::sync("mem:proxy", "slow mock")
            .add_expectation(
                MockExpectation::sync("mem:targetWS")
                    .response_body(Payload::text("late"))
                    .delay(Duration::from_millis(30)),
            )
            .build()
            .unwrap();
        let (endpoint, tx) = endpoint_for(&scenario, "mem:targetWS");

        let started = tokio::time::Instant::now();
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(InboundCall::request(Message::default(), reply_tx)).await.unwrap();
        let reply = reply_rx.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert_eq!(reply, Reply::success(Payload::text("late")));
        endpoint.stop().await;
    }
}
