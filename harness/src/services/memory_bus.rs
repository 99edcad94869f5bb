//! In-process routing collaborator
//!
//! Addresses map to tokio channels. Requests carry a oneshot reply channel,
//! fire-and-forget messages do not.

use async_trait::async_trait;
use shared::{Address, Message, Reply};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use crate::traits::{Binding, InboundCall, Router};

const CHANNEL_CAPACITY: usize = 64;

type Routes = HashMap<Address, mpsc::Sender<InboundCall>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
    routes: Arc<RwLock<Routes>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, address: &Address) -> bool {
        self.read_routes()
            .get(address)
            .is_some_and(|sender| !sender.is_closed())
    }

    fn read_routes(&self) -> std::sync::RwLockReadGuard<'_, Routes> {
        self.routes.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_routes(&self) -> std::sync::RwLockWriteGuard<'_, Routes> {
        self.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sender(&self, address: &Address) -> HarnessResult<mpsc::Sender<InboundCall>> {
        self.read_routes()
            .get(address)
            .cloned()
            .ok_or_else(|| HarnessError::transport(address, "nothing is bound at this address"))
    }
}

#[async_trait]
impl Router for MemoryBus {
    async fn send(&self, address: &Address, message: Message) -> HarnessResult<Reply> {
        let sender = self.sender(address)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        sender
            .send(InboundCall::request(message, reply_tx))
            .await
            .map_err(|_| HarnessError::transport(address, "endpoint stopped receiving"))?;

        match reply_rx.await {
            Ok(reply) => Ok(reply),
            Err(_) => {
                // Handler accepted the call without answering
                debug!("Call to {} accepted without a reply", address);
                Ok(Reply::Success(Message::default()))
            }
        }
    }

    async fn post(&self, address: &Address, message: Message) -> HarnessResult<()> {
        let sender = self.sender(address)?;
        sender
            .send(InboundCall::one_way(message))
            .await
            .map_err(|_| HarnessError::transport(address, "endpoint stopped receiving"))
    }

    async fn bind(&self, address: &Address) -> HarnessResult<Binding> {
        let mut routes = self.write_routes();
        if routes.get(address).is_some_and(|sender| !sender.is_closed()) {
            return Err(HarnessError::transport(address, "address is already bound"));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        routes.insert(address.clone(), tx);
        debug!("🔗 Bound {} on the memory bus", address);
        Ok(Binding {
            address: address.clone(),
            inbound: rx,
        })
    }

    async fn unbind(&self, address: &Address) -> HarnessResult<()> {
        if self.write_routes().remove(address).is_some() {
            debug!("Released {} on the memory bus", address);
        }
        Ok(())
    }
}
