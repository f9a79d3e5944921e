//! The batch runner: fixtures × repeated runs, sequentially.
//!
//! Each (fixture, run) pair walks the same pipeline: fresh sandbox, optional
//! setup hook, agent invocation under the experiment's hard timeout, then
//! two-layer scoring. Per-pair failures are data, never fatal: they become
//! failed records and the batch moves on. Only infrastructure problems
//! (unreadable fixture, sandbox creation) abort the batch.

use crate::error::Result;
use crate::experiment::{Experiment, SystemPromptPolicy};
use crate::fixture::Fixture;
use crate::result::{first_line, FailureKind, RunRecord};
use crate::sandbox::Sandbox;
use crate::score::{self, Verdict};
use crate::toolchain::{self, Toolchain};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// One request to the external generation backend.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub prompt: String,
    pub model: String,
    pub system_prompt: SystemPromptPolicy,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub permission_mode: Option<String>,
    pub max_turns: Option<u32>,
    /// Effective root for the agent's work; already seeded with the
    /// fixture's starter files.
    pub cwd: PathBuf,
}

impl BackendRequest {
    pub fn new(experiment: &Experiment, prompt: String, cwd: &Path) -> Self {
        Self {
            prompt,
            model: experiment.model.clone(),
            system_prompt: experiment.system_prompt.clone(),
            allowed_tools: experiment.allowed_tools.clone(),
            disallowed_tools: experiment.disallowed_tools.clone(),
            permission_mode: experiment.permission_mode.clone(),
            max_turns: experiment.max_turns,
            cwd: cwd.to_path_buf(),
        }
    }
}

/// Terminal outcome of one backend invocation. Cost is informational and
/// present on errors too when the backend reports usage before failing.
#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    Completed { cost_usd: Option<f64> },
    Failed { detail: String, cost_usd: Option<f64> },
}

/// The external code-generation backend.
///
/// Implementations must make generation cancellable: when the returned
/// future is dropped (the runner's timeout path), any underlying process or
/// connection must be torn down rather than left running.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate(&self, request: BackendRequest) -> GenerateOutcome;
}

// ---------------------------------------------------------------------------
// Batch execution
// ---------------------------------------------------------------------------

/// Run every fixture `experiment.runs` times, invoking `observer` as each
/// record is produced so callers can stream progress.
pub async fn run_batch<F>(
    experiment: &Experiment,
    fixtures: &[Fixture],
    backend: &dyn Backend,
    toolchain: Arc<dyn Toolchain>,
    mut observer: F,
) -> Result<Vec<RunRecord>>
where
    F: FnMut(&RunRecord),
{
    let mut records = Vec::with_capacity(fixtures.len() * experiment.runs as usize);
    for fixture in fixtures {
        for run in 1..=experiment.runs {
            debug!(fixture = %fixture.name, run, "starting pair");
            let record = run_pair(experiment, fixture, run, backend, Arc::clone(&toolchain)).await?;
            observer(&record);
            records.push(record);
        }
    }
    Ok(records)
}

/// Execute one (fixture, run) pair. The sandbox is removed on every exit
/// path: the `Sandbox` drop guard covers early returns and panics, and the
/// explicit `close` surfaces removal errors on the ordinary path.
pub async fn run_pair(
    experiment: &Experiment,
    fixture: &Fixture,
    run: u32,
    backend: &dyn Backend,
    toolchain: Arc<dyn Toolchain>,
) -> Result<RunRecord> {
    let start = Instant::now();
    let prompt = fixture.prompt()?;
    let sandbox = Sandbox::for_fixture(fixture)?;

    let outcome = drive(experiment, fixture, run, prompt, &sandbox, backend, toolchain, start).await;

    if let Err(e) = sandbox.close() {
        warn!(fixture = %fixture.name, run, "sandbox removal failed: {e}");
    }
    outcome
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    experiment: &Experiment,
    fixture: &Fixture,
    run: u32,
    prompt: String,
    sandbox: &Sandbox,
    backend: &dyn Backend,
    toolchain: Arc<dyn Toolchain>,
    start: Instant,
) -> Result<RunRecord> {
    let name = fixture.name.as_str();

    if let Some(setup) = &experiment.setup {
        let command = setup.clone();
        let cwd = sandbox.src_dir().to_path_buf();
        let timeout = Duration::from_secs(experiment.setup_timeout_seconds);
        let setup_outcome = match tokio::task::spawn_blocking(move || {
            toolchain::run_shell(&command, &cwd, Some(timeout))
        })
        .await
        {
            Ok(outcome) => outcome,
            // A panicked setup task is contained like any other setup failure.
            Err(e) => {
                let detail = first_line(&e.to_string()).unwrap_or_else(|| "setup task died".into());
                return Ok(RunRecord::fail(name, run, FailureKind::Setup, detail, ms(start)));
            }
        };
        if !setup_outcome.success {
            let detail = first_line(&setup_outcome.output)
                .unwrap_or_else(|| "setup hook failed".to_string());
            return Ok(RunRecord::fail(name, run, FailureKind::Setup, detail, ms(start)));
        }
    }

    let request = BackendRequest::new(experiment, prompt, sandbox.src_dir());
    let budget = Duration::from_secs(experiment.timeout_seconds);
    let cost_usd = match tokio::time::timeout(budget, backend.generate(request)).await {
        // Elapsed: the generate future is dropped here, which is the
        // backend's cue to terminate its subprocess.
        Err(_) => {
            let detail = format!("agent timed out after {}s", experiment.timeout_seconds);
            return Ok(RunRecord::fail(name, run, FailureKind::Timeout, detail, ms(start)));
        }
        Ok(GenerateOutcome::Failed { detail, cost_usd }) => {
            let mut record = RunRecord::fail(name, run, FailureKind::Backend, detail, ms(start));
            record.cost_usd = cost_usd;
            return Ok(record);
        }
        Ok(GenerateOutcome::Completed { cost_usd }) => cost_usd,
    };

    // Scoring shells out synchronously, so it runs off the async runtime.
    let tc = Arc::clone(&toolchain);
    let artifact = sandbox.src_dir().to_path_buf();
    let suite = fixture.checks_path.clone();
    let verdict =
        match tokio::task::spawn_blocking(move || score::score(tc.as_ref(), &artifact, &suite))
            .await
        {
            Ok(verdict) => verdict,
            // A panicked scoring task fails this pair, not the batch.
            Err(e) => {
                let detail =
                    first_line(&e.to_string()).unwrap_or_else(|| "scoring task died".into());
                let mut record =
                    RunRecord::fail(name, run, FailureKind::Checks, detail, ms(start));
                record.cost_usd = cost_usd;
                return Ok(record);
            }
        };

    let mut record = match verdict {
        Verdict::Pass => RunRecord::pass(name, run, ms(start)),
        Verdict::Fail { kind, detail } => RunRecord::fail(name, run, kind, detail, ms(start)),
    };
    record.cost_usd = cost_usd;
    Ok(record)
}

fn ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
