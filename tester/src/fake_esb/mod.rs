//! Fake ESB
//!
//! A small stand-in for the integration platform under test. It binds its
//! service addresses on a [`Router`] and answers them until
//! [`FakeEsb::shutdown`] is called.

pub mod services;

use harness::{Binding, HarnessResult, Router};
use shared::{Address, SharedResult};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use services::Service;

/// Default ports: ESB services, JSON service, first and second mock target
pub const DEFAULT_PORTS: (u16, u16, u16, u16) = (8090, 8091, 9090, 9091);

/// Where the ESB serves and where it calls out to
#[derive(Debug, Clone, PartialEq)]
pub struct EsbLayout {
    pub ping_service: Address,
    pub secure_ping_service: Address,
    pub json_ping_service: Address,
    pub ping_service_proxy: Address,
    pub ping_service_multi_proxy: Address,
    pub ping_service_multi_proxy_unordered: Address,
    pub target_ws: Address,
    pub another_target_ws: Address,
    pub input_queue: Address,
    pub output_queue: Address,
    pub username: String,
    pub password: String,
}

impl EsbLayout {
    /// Layout on localhost with the given ports
    pub fn on_ports(esb: u16, json: u16, target: u16, another_target: u16) -> SharedResult<Self> {
        let service = |port: u16, path: &str| Address::parse(&format!("http://127.0.0.1:{port}/{path}"));

        Ok(Self {
            ping_service: service(esb, "services/pingService")?,
            secure_ping_service: service(esb, "services/securePingService")?,
            json_ping_service: service(json, "jsonPingService")?,
            ping_service_proxy: service(esb, "services/pingServiceProxy")?,
            ping_service_multi_proxy: service(esb, "services/pingServiceMultiProxy")?,
            ping_service_multi_proxy_unordered: service(esb, "services/pingServiceMultiProxyUnordered")?,
            target_ws: service(target, "services/targetWS")?,
            another_target_ws: service(another_target, "services/anotherTargetWS")?,
            input_queue: Address::parse("vm:test.input")?,
            output_queue: Address::parse("vm:test.output")?,
            username: "user".to_string(),
            password: "pass".to_string(),
        })
    }

    pub fn standard() -> SharedResult<Self> {
        let (esb, json, target, another_target) = DEFAULT_PORTS;
        Self::on_ports(esb, json, target, another_target)
    }

    /// Addresses the ESB itself serves
    pub fn services(&self) -> Vec<(Service, Address)> {
        vec![
            (Service::Ping, self.ping_service.clone()),
            (Service::SecurePing, self.secure_ping_service.clone()),
            (Service::JsonPing, self.json_ping_service.clone()),
            (Service::Proxy, self.ping_service_proxy.clone()),
            (Service::MultiProxy, self.ping_service_multi_proxy.clone()),
            (Service::MultiProxyUnordered, self.ping_service_multi_proxy_unordered.clone()),
            (Service::Canonicaliser, self.input_queue.clone()),
        ]
    }
}

pub struct FakeEsb {
    router: Arc<dyn Router>,
    layout: Arc<EsbLayout>,
    bound: Vec<Address>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeEsb {
    /// Bind every service of `layout` on `router` and start answering
    ///
    /// On a binding failure the services bound so far are released again.
    pub async fn start(router: Arc<dyn Router>, layout: EsbLayout) -> HarnessResult<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let mut esb = Self {
            router,
            layout: Arc::new(layout),
            bound: Vec::new(),
            shutdown_tx,
            tasks: Vec::new(),
        };

        for (service, address) in esb.layout.services() {
            let binding = match esb.router.bind(&address).await {
                Ok(binding) => binding,
                Err(e) => {
                    warn!("❌ Fake ESB could not bind {:?} at {}: {}", service, address, e);
                    esb.shutdown().await;
                    return Err(e);
                }
            };
            debug!("🔌 {:?} bound at {}", service, address);
            esb.bound.push(address);
            esb.tasks.push(tokio::spawn(serve(
                service,
                binding,
                esb.router.clone(),
                esb.layout.clone(),
                esb.shutdown_tx.subscribe(),
            )));
        }

        info!("🚌 Fake ESB started with {} service(s)", esb.bound.len());
        Ok(esb)
    }

    pub fn layout(&self) -> &EsbLayout {
        &self.layout
    }

    /// Stop answering and release every bound address
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Fake ESB service task ended abnormally: {}", e);
            }
        }
        for address in self.bound.drain(..) {
            if let Err(e) = self.router.unbind(&address).await {
                warn!("Failed to release {}: {}", address, e);
            }
        }
        info!("🛑 Fake ESB stopped");
    }
}

impl Drop for FakeEsb {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn serve(
    service: Service,
    mut binding: Binding,
    router: Arc<dyn Router>,
    layout: Arc<EsbLayout>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = binding.inbound.recv() => {
                let Some(call) = received else {
                    break;
                };
                let router = router.clone();
                let layout = layout.clone();
                // Calls are independent; a slow callout must not block the next one
                tokio::spawn(async move {
                    let reply = service.handle(router.as_ref(), &layout, call.message).await;
                    if let (Some(reply_to), Some(reply)) = (call.reply_to, reply) {
                        let _ = reply_to.send(reply);
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("{:?} stopped serving {}", service, binding.address);
}
