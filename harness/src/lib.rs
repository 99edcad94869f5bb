//! Orchestrated integration-test engine
//!
//! Declares scenarios (initiating call, expected reply, mock expectations),
//! runs them against a system under test through a routing collaborator,
//! and reports deterministic verdicts.

pub mod config;
pub mod engine;
pub mod error;
pub mod mock;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod services;
pub mod suite;
pub mod traits;

pub use config::RunnerConfig;
pub use engine::matcher::{MessageMatcher, Predicate};
pub use engine::verdict::{Cause, CauseKind, GroupState, Outcome, Verdict};
pub use error::{HarnessError, HarnessResult};
pub use mock::{EndpointReport, MockEndpoint};
pub use report::{ReportCollector, ReportEntry, ReportSummary};
pub use runner::ScenarioRunner;
pub use scenario::{ExpectedOutcome, MockExpectation, Mode, Ordering, Scenario, ScenarioBuilder};
pub use services::{HttpRouter, MemoryBus, SchemeRouter};
pub use suite::{ScenarioCase, Suite};
pub use traits::{Binding, InboundCall, Router};
