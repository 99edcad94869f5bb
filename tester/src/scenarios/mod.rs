//! Demo scenarios against the fake ESB
//!
//! `ping` exercises the services directly; `mediation` puts mock endpoints
//! behind the proxies and the asynchronous canonicaliser.

pub mod mediation;
pub mod ping;

use harness::{HarnessResult, Scenario, Suite};
use shared::{ContentType, Payload};
use std::path::PathBuf;

use crate::fake_esb::EsbLayout;

pub const SUITE_NAME: &str = "acme";

/// Directory holding the request/response documents used by the scenarios
pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

pub(crate) fn data_file(name: &str) -> HarnessResult<Payload> {
    Ok(Payload::from_file(data_dir().join(name), ContentType::Xml)?)
}

/// Every demo scenario, in declaration order
pub fn acme_scenarios(layout: &EsbLayout) -> HarnessResult<Vec<Scenario>> {
    let mut scenarios = ping::scenarios(layout)?;
    scenarios.extend(mediation::scenarios(layout)?);
    Ok(scenarios)
}

pub fn acme_suite(layout: &EsbLayout) -> HarnessResult<Suite> {
    Suite::from_scenarios(SUITE_NAME, acme_scenarios(layout)?)
}
