//! Acme demo runner
//!
//! Starts the fake ESB, runs the acme scenario suite against it through the
//! harness and prints the verdict table. Exits non-zero when any scenario
//! did not pass.

use anyhow::Context;
use clap::Parser;
use harness::{RunnerConfig, ScenarioRunner, SchemeRouter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tester::{EsbLayout, FakeEsb, acme_suite};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Runs the acme integration scenarios against the fake ESB")]
struct Args {
    /// Only run these scenarios (repeatable)
    #[arg(long)]
    scenario: Vec<String>,

    /// Per-scenario timeout in milliseconds (overrides HARNESS_TIMEOUT_MS)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Watch window for UNRECEIVED expectations in milliseconds
    #[arg(long)]
    quiet_period_ms: Option<u64>,

    /// Scenarios run at the same time
    #[arg(long)]
    parallelism: Option<usize>,

    /// Archive the report as JSON at this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// List scenario names and exit
    #[arg(long)]
    list: bool,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn runner_config(&self) -> anyhow::Result<RunnerConfig> {
        let mut config = RunnerConfig::from_env().context("reading HARNESS_* environment")?;
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.quiet_period_ms {
            config = config.with_quiet_period(Duration::from_millis(ms));
        }
        if let Some(parallelism) = self.parallelism {
            config = config.with_parallelism(parallelism);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    shared::logging::init_tracing_with_level(Some(if args.verbose { "debug" } else { "info" }));

    let layout = EsbLayout::standard()?;
    let mut suite = acme_suite(&layout)?;

    if args.list {
        for name in suite.names() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }
    if !args.scenario.is_empty() {
        suite = suite.select(args.scenario.as_slice())?;
    }

    let config = args.runner_config()?;
    tracing::info!(
        "🧪 Running {} scenario(s), timeout {:?}, parallelism {}",
        suite.len(),
        config.default_timeout,
        config.parallelism
    );

    let router = Arc::new(SchemeRouter::with_timeout(config.default_timeout)?);
    let mut esb = FakeEsb::start(router.clone(), layout)
        .await
        .context("starting the fake ESB")?;

    let runner = ScenarioRunner::new(router.clone(), config);
    let outcome = suite.run_all(&runner).await;

    esb.shutdown().await;
    router.http().shutdown().await;

    let report = outcome?;
    println!("{}", report.render());

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    let summary = report.summary();
    if summary.all_passed() {
        tracing::info!("🏁 All {} scenario(s) passed", summary.total);
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(
            "❌ {} failed, {} timed out of {}",
            summary.failed,
            summary.timed_out,
            summary.total
        );
        Ok(ExitCode::FAILURE)
    }
}
