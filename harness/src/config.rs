//! Runner configuration
//!
//! Runner-wide defaults that scenarios may override individually.

use shared::{SharedError, SharedResult};
use std::env;
use std::time::Duration;

pub const TIMEOUT_ENV: &str = "HARNESS_TIMEOUT_MS";
pub const QUIET_PERIOD_ENV: &str = "HARNESS_QUIET_PERIOD_MS";
pub const PARALLELISM_ENV: &str = "HARNESS_PARALLELISM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Overall timeout for scenarios that do not declare one
    pub default_timeout: Duration,
    /// Watch window for UNRECEIVED expectations once everything else settled;
    /// `None` watches until the scenario deadline
    pub quiet_period: Option<Duration>,
    /// Scenarios run concurrently by `Suite::run_all`
    pub parallelism: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            quiet_period: None,
            parallelism: 1,
        }
    }
}

impl RunnerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_quiet_period(mut self, period: Duration) -> Self {
        self.quiet_period = Some(period);
        self
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - HARNESS_TIMEOUT_MS: default overall timeout in milliseconds (default: 5000)
    /// - HARNESS_QUIET_PERIOD_MS: UNRECEIVED watch window in milliseconds (default: until deadline)
    /// - HARNESS_PARALLELISM: concurrent scenarios (default: 1)
    pub fn from_env() -> SharedResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> SharedResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(ms) = parse_positive(TIMEOUT_ENV, lookup(TIMEOUT_ENV))? {
            config.default_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_positive(QUIET_PERIOD_ENV, lookup(QUIET_PERIOD_ENV))? {
            config.quiet_period = Some(Duration::from_millis(ms));
        }
        if let Some(parallelism) = parse_positive(PARALLELISM_ENV, lookup(PARALLELISM_ENV))? {
            config.parallelism = parallelism as usize;
        }

        Ok(config)
    }
}

fn parse_positive(field: &str, value: Option<String>) -> SharedResult<Option<u64>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(Some(parsed)),
        _ => Err(SharedError::InvalidConfig {
            field: field.to_string(),
            value: raw,
        }),
    }
}
