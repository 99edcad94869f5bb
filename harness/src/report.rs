//! Report Collector
//!
//! Accumulates one verdict per scenario and exposes them in declaration
//! order, whatever order the runs completed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Mutex;

use crate::engine::verdict::{Outcome, Verdict};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Declaration index within the suite
    pub index: usize,
    pub scenario: String,
    pub outcome: Outcome,
    pub cause: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl ReportSummary {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ArchivedReport {
    generated_at: DateTime<Utc>,
    summary: ReportSummary,
    entries: Vec<ReportEntry>,
}

/// Thread-safe, append-only verdict store
#[derive(Debug, Default)]
pub struct ReportCollector {
    entries: Mutex<BTreeMap<usize, ReportEntry>>,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict of the scenario declared at `index`
    ///
    /// A scenario is reported at most once; a second verdict under the same
    /// name is rejected.
    pub fn record(&self, index: usize, verdict: Verdict) -> HarnessResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.contains_key(&index) || entries.values().any(|e| e.scenario == verdict.scenario) {
            return Err(HarnessError::DuplicateVerdict {
                scenario: verdict.scenario,
            });
        }

        tracing::debug!("📝 Recorded {} for '{}'", verdict.outcome, verdict.scenario);
        entries.insert(
            index,
            ReportEntry {
                index,
                scenario: verdict.scenario.clone(),
                outcome: verdict.outcome,
                cause: verdict.cause_summary(),
                verdict,
            },
        );
        Ok(())
    }

    /// Entries in declaration order
    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> ReportSummary {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut summary = ReportSummary {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries.values() {
            match entry.outcome {
                Outcome::Passed => summary.passed += 1,
                Outcome::Failed => summary.failed += 1,
                Outcome::TimedOut => summary.timed_out += 1,
            }
        }
        summary
    }

    pub fn to_json(&self) -> HarnessResult<String> {
        let archived = ArchivedReport {
            generated_at: Utc::now(),
            summary: self.summary(),
            entries: self.entries(),
        };
        Ok(serde_json::to_string_pretty(&archived)?)
    }

    /// Archive the report as JSON at `path`
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> HarnessResult<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json)?;
        tracing::info!("💾 Report written to {}", path.as_ref().display());
        Ok(())
    }

    /// Plain-text table for terminals
    pub fn render(&self) -> String {
        let entries = self.entries();
        let width = entries
            .iter()
            .map(|e| e.scenario.chars().count())
            .max()
            .unwrap_or(0)
            .max("SCENARIO".len());

        let mut out = String::new();
        let _ = writeln!(out, "{:<width$}  {:<9}  {:>8}  CAUSE", "SCENARIO", "OUTCOME", "ELAPSED");
        for entry in &entries {
            let _ = writeln!(
                out,
                "{:<width$}  {:<9}  {:>6}ms  {}",
                entry.scenario,
                entry.outcome.to_string(),
                entry.verdict.elapsed_ms,
                entry.cause
            );
        }

        let summary = self.summary();
        let _ = writeln!(
            out,
            "\n{} scenario(s): {} passed, {} failed, {} timed out",
            summary.total, summary.passed, summary.failed, summary.timed_out
        );
        out
    }
}
