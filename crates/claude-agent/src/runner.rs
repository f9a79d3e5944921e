use std::fmt;

use futures::StreamExt;

use crate::stream::QueryStream;
use crate::types::{Message, ResultMessage};
use crate::{ClaudeAgentError, Result};

// ─── RunOutcome ───────────────────────────────────────────────────────────

/// Terminal state of a driven query, folded from the stream's `Result`
/// message.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    /// The final text the agent produced (empty for error stops).
    pub result_text: String,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    pub duration_ms: u64,
    /// Error strings reported by the CLI (empty for `Completed`).
    pub errors: Vec<String>,
    pub stop: StopReason,
}

impl RunOutcome {
    /// `true` unless the agent finished on its own.
    pub fn is_error(&self) -> bool {
        self.stop != StopReason::Completed
    }
}

/// Why the agent stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The agent finished its work and produced a final message.
    Completed,
    /// The turn limit was reached before the agent finished.
    MaxTurns,
    /// The CLI reported an error during execution.
    ExecutionError,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::MaxTurns => "max turns exceeded",
            StopReason::ExecutionError => "execution error",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Collectors ───────────────────────────────────────────────────────────

/// Consume a [`QueryStream`] to completion and return the terminal outcome.
///
/// Returns `Err` if the stream ends without a `Result` message (process
/// crashed or was killed) or if any message fails to parse.
pub async fn collect(stream: QueryStream) -> Result<RunOutcome> {
    collect_with(stream, |_| {}).await
}

/// Like [`collect`], but invokes `observe` on every message before it is
/// folded into the outcome. Callers use this to trace tool activity live.
///
/// ```rust,ignore
/// use claude_agent::{collect_with, query, Message, QueryOptions};
///
/// let outcome = collect_with(query("say hello", QueryOptions::default()), |msg| {
///     if let Message::Assistant(_) = msg {
///         eprintln!("agent turn");
///     }
/// })
/// .await?;
/// println!("{}", outcome.result_text);
/// ```
pub async fn collect_with<F>(stream: QueryStream, mut observe: F) -> Result<RunOutcome>
where
    F: FnMut(&Message),
{
    let mut stream = stream;

    while let Some(msg) = stream.next().await {
        let msg = msg?;
        observe(&msg);
        if let Message::Result(r) = msg {
            // Result is the terminal message; the stream ends after it.
            return Ok(fold_result(r));
        }
    }

    Err(ClaudeAgentError::Process(
        "stream ended without a result message".into(),
    ))
}

fn fold_result(r: ResultMessage) -> RunOutcome {
    let stop = match &r {
        ResultMessage::Success(_) => StopReason::Completed,
        ResultMessage::ErrorMaxTurns(_) => StopReason::MaxTurns,
        ResultMessage::ErrorDuringExecution(_) => StopReason::ExecutionError,
    };
    RunOutcome {
        session_id: r.session_id().to_string(),
        result_text: r.result_text().unwrap_or("").to_string(),
        total_cost_usd: r.total_cost_usd(),
        num_turns: r.num_turns(),
        duration_ms: r.duration_ms(),
        errors: r.errors().to_vec(),
        stop,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
