//! Demo system under test and scenario suite
//!
//! [`FakeEsb`] plays the integration platform: XML and JSON ping services,
//! proxies that call out to target services, and an asynchronous
//! canonicaliser. [`acme_suite`] declares the scenarios that exercise it
//! through the harness.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use harness::{RunnerConfig, ScenarioRunner, SchemeRouter};
//! use tester::{EsbLayout, FakeEsb, acme_suite};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let router = Arc::new(SchemeRouter::with_timeout(std::time::Duration::from_secs(5))?);
//! let layout = EsbLayout::standard()?;
//! let mut esb = FakeEsb::start(router.clone(), layout.clone()).await?;
//!
//! let runner = ScenarioRunner::new(router, RunnerConfig::default());
//! let report = acme_suite(&layout)?.run_all(&runner).await?;
//! println!("{}", report.render());
//!
//! esb.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod fake_esb;
pub mod scenarios;

pub use fake_esb::{EsbLayout, FakeEsb};
pub use scenarios::{acme_scenarios, acme_suite};
