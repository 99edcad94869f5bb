//! Shared logging utilities for consistent tracing across harness components

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Build the filter directive used by every harness binary and test
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("harness={base_level},shared={base_level},tester={base_level},hyper=warn,reqwest=warn,axum=warn")
}

/// Initialize tracing subscriber with an explicit log level
///
/// `RUST_LOG` wins over the supplied level when it is set. Safe to call more
/// than once (later calls are ignored), which matters for test binaries.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Initialize tracing subscriber at the default (info) level
pub fn init_tracing() {
    init_tracing_with_level(None);
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for scenario-aware info logging
#[macro_export]
macro_rules! scenario_info {
    ($scenario:expr, $($arg:tt)*) => {
        tracing::info!(
            scenario = %$scenario,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for scenario-aware warning logging
#[macro_export]
macro_rules! scenario_warn {
    ($scenario:expr, $($arg:tt)*) => {
        tracing::warn!(
            scenario = %$scenario,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for scenario-aware error logging
#[macro_export]
macro_rules! scenario_error {
    ($scenario:expr, $($arg:tt)*) => {
        tracing::error!(
            scenario = %$scenario,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for scenario-aware debug logging
#[macro_export]
macro_rules! scenario_debug {
    ($scenario:expr, $($arg:tt)*) => {
        tracing::debug!(
            scenario = %$scenario,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for the start of a scenario run
pub fn log_scenario_start(scenario: &str, details: &str) {
    info!(
        scenario = %scenario,
        timestamp = format_timestamp(),
        "🧪 Running {}",
        details
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(scenario: &str, context: &str, error: &dyn std::fmt::Display) {
    error!(
        scenario = %scenario,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(scenario: &str, message: &str) {
    info!(
        scenario = %scenario,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_covers_workspace_targets() {
        let directive = filter_directive(Some("debug"));
        assert!(directive.contains("harness=debug"));
        assert!(directive.contains("shared=debug"));
        assert!(directive.contains("tester=debug"));
        assert!(directive.contains("hyper=warn"));

        assert!(filter_directive(None).starts_with("harness=info"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing_with_level(Some("debug"));
        scenario_info!("logging-test", "still logging after double init");
    }

    #[test]
    fn test_format_timestamp_shape() {
        let stamp = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(stamp.len(), 12);
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(&stamp[8..9], ".");
    }
}
