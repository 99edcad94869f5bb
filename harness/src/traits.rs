//! Trait definitions with mockall annotations for testing
//!
//! The engine talks to the outside world only through [`Router`]: the routing
//! collaborator that dispatches the initiating call of a scenario and binds the
//! listeners used by mock endpoints. Production implementations live in
//! `services`; tests substitute `MockRouter`.

use shared::{Address, Message, Reply};
use tokio::sync::{mpsc, oneshot};

use crate::error::HarnessResult;

/// A call delivered to a bound address
///
/// `reply_to` is present for request-response interactions and absent for
/// fire-and-forget ones.
#[derive(Debug)]
pub struct InboundCall {
    pub message: Message,
    pub reply_to: Option<oneshot::Sender<Reply>>,
}

impl InboundCall {
    pub fn request(message: Message, reply_to: oneshot::Sender<Reply>) -> Self {
        Self {
            message,
            reply_to: Some(reply_to),
        }
    }

    pub fn one_way(message: Message) -> Self {
        Self {
            message,
            reply_to: None,
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.reply_to.is_some()
    }
}

/// Inbound call stream for one bound address
#[derive(Debug)]
pub struct Binding {
    pub address: Address,
    pub inbound: mpsc::Receiver<InboundCall>,
}

/// Routing collaborator abstraction
///
/// Implementations move messages between addresses; the harness never
/// resolves endpoints itself.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    /// Deliver a request and wait for the reply
    ///
    /// # Returns
    /// The reply (success or structured fault), or a transport error when the
    /// message could not be delivered at all
    async fn send(&self, address: &Address, message: Message) -> HarnessResult<Reply>;

    /// Deliver a fire-and-forget message; resolves once the collaborator accepted it
    async fn post(&self, address: &Address, message: Message) -> HarnessResult<()>;

    /// Start receiving calls addressed to `address`
    async fn bind(&self, address: &Address) -> HarnessResult<Binding>;

    /// Release a binding created by [`Router::bind`]
    async fn unbind(&self, address: &Address) -> HarnessResult<()>;
}
