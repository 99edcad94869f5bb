//! Shared types for the integration test harness
//!
//! Contains the wire-level vocabulary every component agrees on: addresses,
//! payloads, messages, faults and observed call records, plus the common
//! error type and logging setup.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{Fault, Message, ObservedCall, Reply};
