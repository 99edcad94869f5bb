//! Message types exchanged with routing collaborators
//!
//! This module organizes the messages that flow through a scenario run:
//! - `exchange`: request/reply envelopes and structured faults
//! - `observed`: immutable records of calls captured by mock endpoints

pub mod exchange;
pub mod observed;

pub use exchange::{Fault, Message, Reply};
pub use observed::ObservedCall;
