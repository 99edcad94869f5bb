//! Test-runner integration
//!
//! A [`Suite`] is the configured list of scenarios. External test runners
//! take one [`ScenarioCase`] per scenario; [`Suite::run_all`] runs everything
//! into a [`ReportCollector`], optionally with bounded parallelism.

use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::verdict::Verdict;
use crate::error::{HarnessError, HarnessResult};
use crate::report::ReportCollector;
use crate::runner::ScenarioRunner;
use crate::scenario::Scenario;

/// One runnable test case
#[derive(Debug, Clone)]
pub struct ScenarioCase {
    index: usize,
    scenario: Arc<Scenario>,
}

impl ScenarioCase {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        self.scenario.name()
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub async fn run(&self, runner: &ScenarioRunner) -> Verdict {
        runner.run(&self.scenario).await
    }
}

#[derive(Debug, Default)]
pub struct Suite {
    name: String,
    scenarios: Vec<Arc<Scenario>>,
}

impl Suite {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
        }
    }

    /// Build a suite, rejecting duplicate scenario names
    pub fn from_scenarios<S: Into<String>>(name: S, scenarios: Vec<Scenario>) -> HarnessResult<Self> {
        let mut suite = Self::new(name);
        for scenario in scenarios {
            suite.add(scenario)?;
        }
        Ok(suite)
    }

    pub fn add(&mut self, scenario: Scenario) -> HarnessResult<()> {
        if self.scenarios.iter().any(|s| s.name() == scenario.name()) {
            return Err(HarnessError::configuration(
                scenario.name(),
                format!("scenario name is not unique in suite '{}'", self.name),
            ));
        }
        self.scenarios.push(Arc::new(scenario));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    /// One case per scenario, in declaration order
    pub fn cases(&self) -> Vec<ScenarioCase> {
        self.scenarios
            .iter()
            .enumerate()
            .map(|(index, scenario)| ScenarioCase {
                index,
                scenario: scenario.clone(),
            })
            .collect()
    }

    /// Keep only the named scenarios; unknown names are a configuration error
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> HarnessResult<Suite> {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let known: HashSet<&str> = self.names().into_iter().collect();

        let mut unknown: Vec<&str> = wanted.difference(&known).copied().collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(HarnessError::configuration(
                unknown.join(", "),
                format!("not found in suite '{}'", self.name),
            ));
        }

        Ok(Suite {
            name: self.name.clone(),
            scenarios: self
                .scenarios
                .iter()
                .filter(|s| wanted.contains(s.name()))
                .cloned()
                .collect(),
        })
    }

    /// Run every scenario once, at most `runner.config().parallelism` at a time
    pub async fn run_all(&self, runner: &ScenarioRunner) -> HarnessResult<ReportCollector> {
        let collector = ReportCollector::new();
        let parallelism = runner.config().parallelism.max(1);
        tracing::info!(
            "🚀 Running suite '{}': {} scenario(s), parallelism {}",
            self.name,
            self.len(),
            parallelism
        );

        let mut verdicts = stream::iter(self.cases())
            .map(|case| async move {
                let verdict = case.run(runner).await;
                (case.index(), verdict)
            })
            .buffer_unordered(parallelism);

        while let Some((index, verdict)) = verdicts.next().await {
            collector.record(index, verdict)?;
        }

        Ok(collector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn scenario(name: &str) -> Scenario {
        Scenario::sync("mem:pingService", name).build().unwrap()
    }

    #[test]
    fn test_names_must_be_unique() {
        let err = Suite::from_scenarios("acme", vec![scenario("a"), scenario("a")]).unwrap_err();
        assert_matches!(err, HarnessError::Configuration { scenario, .. } if scenario == "a");
    }

    #[test]
    fn test_cases_keep_declaration_order() {
        let suite = Suite::from_scenarios("acme", vec![scenario("a"), scenario("b"), scenario("c")]).unwrap();
        let cases = suite.cases();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[2].index(), 2);
        assert_eq!(cases[2].name(), "c");
    }

    #[test]
    fn test_select_filters_and_validates() {
        let suite = Suite::from_scenarios("acme", vec![scenario("a"), scenario("b"), scenario("c")]).unwrap();

        let selected = suite.select(&["c", "a"]).unwrap();
        assert_eq!(selected.names(), vec!["a", "c"]);

        let err = suite.select(&["a", "zzz"]).unwrap_err();
        assert_matches!(err, HarnessError::Configuration { scenario, .. } if scenario == "zzz");
    }
}
