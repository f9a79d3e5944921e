use crate::backend::ClaudeBackend;
use crate::output::print_json;
use anyhow::{bail, Context};
use skillbench_core::experiment::Experiment;
use skillbench_core::report::Report;
use skillbench_core::result::RunRecord;
use skillbench_core::runner::run_batch;
use skillbench_core::toolchain::{GoToolchain, Toolchain};
use skillbench_core::{fixture, paths};
use std::path::Path;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// RunsFailed: typed gate failure (no std::process::exit in command code)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct RunsFailed {
    pub failed: u32,
    pub total: u32,
}

impl std::fmt::Display for RunsFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} of {} runs failed", self.failed, self.total)
    }
}

impl std::error::Error for RunsFailed {}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    name: &str,
    runs_override: Option<u32>,
    fixture_override: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let mut experiment = Experiment::load(root, name)
        .with_context(|| format!("failed to load experiment '{name}'"))?;
    if let Some(runs) = runs_override {
        experiment.runs = runs;
    }
    if let Some(filter) = fixture_override {
        experiment.fixture_filter = Some(filter.to_string());
    }
    // Overrides can break invariants the file-level load already checked.
    experiment.validate(name)?;

    let evals = paths::evals_root(root);
    let fixtures = fixture::discover(&evals, |n| experiment.matches_fixture(n))
        .context("fixture discovery failed")?;
    if fixtures.is_empty() {
        bail!("no fixtures matched under {}", evals.display());
    }

    eprintln!(
        "Running experiment '{name}': {} fixture(s) x {} run(s), model {}",
        fixtures.len(),
        experiment.runs,
        experiment.model
    );

    let backend = ClaudeBackend;
    let toolchain: Arc<dyn Toolchain> = Arc::new(GoToolchain::default());
    let total_runs = experiment.runs;

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let records = runtime.block_on(run_batch(
        &experiment,
        &fixtures,
        &backend,
        toolchain,
        |record| print_progress(record, total_runs),
    ))?;

    let report = Report::from_records(records);
    if json {
        print_json(&report.to_json())?;
    } else {
        report.render(&mut std::io::stdout())?;
    }

    if !report.all_passed() {
        return Err(RunsFailed {
            failed: report.total - report.passed,
            total: report.total,
        }
        .into());
    }
    Ok(())
}

/// One stderr line per finished run, streamed while the batch progresses.
fn print_progress(record: &RunRecord, total_runs: u32) {
    let seconds = record.duration_ms as f64 / 1000.0;
    match record.failure_kind() {
        None => eprintln!(
            "  \u{2713} {} run {}/{} ({seconds:.1}s)",
            record.fixture, record.run, total_runs
        ),
        Some(kind) => eprintln!(
            "  \u{2717} {} run {}/{} [{}] ({seconds:.1}s)",
            record.fixture,
            record.run,
            total_runs,
            kind.as_str()
        ),
    }
}
