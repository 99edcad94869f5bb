//! Scheme-dispatching router: HTTP(S) addresses go over HTTP, everything
//! else over the in-process bus.

use async_trait::async_trait;
use shared::{Address, Message, Reply};
use std::sync::Arc;
use std::time::Duration;

use crate::error::HarnessResult;
use crate::services::http::HttpRouter;
use crate::services::memory_bus::MemoryBus;
use crate::traits::{Binding, Router};

pub struct SchemeRouter {
    memory: MemoryBus,
    http: Arc<HttpRouter>,
}

impl SchemeRouter {
    pub fn new(memory: MemoryBus, http: Arc<HttpRouter>) -> Self {
        Self { memory, http }
    }

    /// Memory bus plus an HTTP router with the given client timeout
    pub fn with_timeout(timeout: Duration) -> HarnessResult<Self> {
        Ok(Self::new(MemoryBus::new(), Arc::new(HttpRouter::new(timeout)?)))
    }

    pub fn memory(&self) -> &MemoryBus {
        &self.memory
    }

    pub fn http(&self) -> &HttpRouter {
        &self.http
    }

    fn route(&self, address: &Address) -> &dyn Router {
        if address.is_http() {
            self.http.as_ref()
        } else {
            &self.memory
        }
    }
}

#[async_trait]
impl Router for SchemeRouter {
    async fn send(&self, address: &Address, message: Message) -> HarnessResult<Reply> {
        self.route(address).send(address, message).await
    }

    async fn post(&self, address: &Address, message: Message) -> HarnessResult<()> {
        self.route(address).post(address, message).await
    }

    async fn bind(&self, address: &Address) -> HarnessResult<Binding> {
        self.route(address).bind(address).await
    }

    async fn unbind(&self, address: &Address) -> HarnessResult<()> {
        self.route(address).unbind(address).await
    }
}
