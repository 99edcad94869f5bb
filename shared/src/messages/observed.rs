//! Observed call records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messages::exchange::Message;
use crate::types::Address;

/// A call received by a mock endpoint, captured on arrival and never mutated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObservedCall {
    pub id: Uuid,
    pub address: Address,
    pub received_at: DateTime<Utc>,
    pub message: Message,
    /// Whether the caller is waiting for a reply
    pub expects_reply: bool,
}

impl ObservedCall {
    pub fn capture(address: Address, message: Message, expects_reply: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            received_at: Utc::now(),
            message,
            expects_reply,
        }
    }
}
