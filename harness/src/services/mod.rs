//! Routing collaborators: in-process bus, HTTP, and a scheme dispatcher

pub mod http;
pub mod memory_bus;
pub mod scheme;

pub use http::{FAULT_CODE_HEADER, HttpRouter};
pub use memory_bus::MemoryBus;
pub use scheme::SchemeRouter;
