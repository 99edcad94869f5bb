//! Shared fixtures for harness integration tests

#![allow(dead_code)]

use harness::{MemoryBus, Router, RunnerConfig, ScenarioRunner};
use shared::{Address, Message, Reply};
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub fn init_test_tracing() {
    shared::logging::init_tracing_with_level(Some("debug"));
}

pub fn address(raw: &str) -> Address {
    Address::parse(raw).unwrap()
}

/// Runner over `bus` with short test timeouts
pub fn runner(bus: &MemoryBus) -> ScenarioRunner {
    ScenarioRunner::new(
        Arc::new(bus.clone()),
        RunnerConfig::default().with_timeout(Duration::from_millis(500)),
    )
}

/// Serve `address` on the bus; each call runs `handler` on its own task
///
/// The handler's reply (if any) is sent back to callers awaiting one.
pub async fn serve<F, Fut>(bus: &MemoryBus, address_raw: &str, handler: F) -> JoinHandle<()>
where
    F: Fn(MemoryBus, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Reply>> + Send + 'static,
{
    let mut binding = bus.bind(&address(address_raw)).await.unwrap();
    let bus = bus.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Some(call) = binding.inbound.recv().await {
            let bus = bus.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let reply = handler(bus, call.message).await;
                if let (Some(reply_to), Some(reply)) = (call.reply_to, reply) {
                    let _ = reply_to.send(reply);
                }
            });
        }
    })
}

/// A free localhost port for HTTP bindings
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
