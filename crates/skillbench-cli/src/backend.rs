//! Generation backend driving the `claude` CLI.
//!
//! The runner hands over one [`BackendRequest`] per (fixture, run) pair; this
//! module turns it into a single non-interactive subprocess query and folds
//! the streamed outcome back into a [`GenerateOutcome`]. Credentials and any
//! endpoint override reach the subprocess through the inherited process
//! environment and are never read or logged here.

use async_trait::async_trait;
use claude_agent::{
    collect_with, query, ContentBlock, Message, PermissionMode, QueryOptions, RunOutcome,
    SystemPayload, UserContentBlock,
};
use skillbench_core::experiment::SystemPromptPolicy;
use skillbench_core::result::first_line;
use skillbench_core::runner::{Backend, BackendRequest, GenerateOutcome};
use tracing::debug;

/// Cancellation contract: dropping the `generate` future (the runner's
/// timeout path) tears the subprocess down with it.
#[derive(Debug, Default)]
pub struct ClaudeBackend;

#[async_trait]
impl Backend for ClaudeBackend {
    async fn generate(&self, request: BackendRequest) -> GenerateOutcome {
        let options = build_options(&request);
        match collect_with(query(request.prompt, options), trace_message).await {
            Ok(outcome) => fold_outcome(outcome),
            Err(e) => {
                let text = e.to_string();
                debug!(error = %text, "claude invocation failed");
                GenerateOutcome::Failed {
                    detail: first_line(&text).unwrap_or(text),
                    cost_usd: None,
                }
            }
        }
    }
}

/// Map a terminal [`RunOutcome`] to the runner's verdict. Cost is always
/// reported, on the error arm too, since the CLI bills failed runs.
fn fold_outcome(outcome: RunOutcome) -> GenerateOutcome {
    if !outcome.is_error() {
        return GenerateOutcome::Completed {
            cost_usd: Some(outcome.total_cost_usd),
        };
    }
    let mut detail = format!(
        "agent stopped after {} turn(s): {}",
        outcome.num_turns, outcome.stop
    );
    if let Some(error) = outcome.errors.first() {
        detail.push_str(": ");
        detail.push_str(error);
    }
    GenerateOutcome::Failed {
        detail,
        cost_usd: Some(outcome.total_cost_usd),
    }
}

fn build_options(request: &BackendRequest) -> QueryOptions {
    let mut options = QueryOptions {
        model: Some(request.model.clone()),
        max_turns: request.max_turns,
        allowed_tools: request.allowed_tools.clone(),
        disallowed_tools: request.disallowed_tools.clone(),
        permission_mode: request
            .permission_mode
            .as_deref()
            .and_then(PermissionMode::parse)
            .unwrap_or(PermissionMode::DontAsk),
        cwd: Some(request.cwd.clone()),
        ..QueryOptions::default()
    };
    match &request.system_prompt {
        SystemPromptPolicy::Preset => {}
        SystemPromptPolicy::Append(text) => options.append_system_prompt = Some(text.clone()),
        SystemPromptPolicy::Replace(text) => options.system_prompt = Some(text.clone()),
    }
    options
}

/// Debug-level trace of agent activity, one line per interesting event.
/// Enabled with `--verbose` or `RUST_LOG=debug`.
fn trace_message(message: &Message) {
    match message {
        Message::System(system) => {
            if let SystemPayload::Init(init) = &system.payload {
                debug!(model = %init.model, tools = init.tools.len(), "agent session started");
            }
        }
        Message::Assistant(assistant) => {
            for block in &assistant.message.content {
                match block {
                    ContentBlock::ToolUse { name, input, .. } => {
                        debug!(tool = %name, target = %tool_target(input), "tool call");
                    }
                    ContentBlock::Text { text } => {
                        if let Some(line) = first_line(text) {
                            debug!("agent: {}", truncate(&line, 120));
                        }
                    }
                    ContentBlock::Thinking { .. } => {}
                }
            }
        }
        Message::User(user) => {
            for block in &user.message.content {
                if let UserContentBlock::ToolResult {
                    tool_use_id,
                    is_error: Some(true),
                    ..
                } = block
                {
                    debug!(tool_use_id = %tool_use_id, "tool reported an error");
                }
            }
        }
        Message::Result(_) => {}
    }
}

/// Best-effort representative argument of a tool call, for the trace line.
fn tool_target(input: &serde_json::Value) -> String {
    for key in ["command", "file_path", "path", "pattern"] {
        if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
            return truncate(value, 80);
        }
    }
    String::new()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use claude_agent::StopReason;
    use std::path::PathBuf;

    fn request() -> BackendRequest {
        BackendRequest {
            prompt: "write the function".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            system_prompt: SystemPromptPolicy::Preset,
            allowed_tools: vec!["Read".to_string(), "Write".to_string()],
            disallowed_tools: vec!["WebSearch".to_string()],
            permission_mode: None,
            max_turns: Some(30),
            cwd: PathBuf::from("/tmp/sandbox/src"),
        }
    }

    #[test]
    fn preset_policy_sends_no_prompt_overrides() {
        let options = build_options(&request());
        assert_eq!(options.system_prompt, None);
        assert_eq!(options.append_system_prompt, None);
        assert_eq!(options.model.as_deref(), Some("claude-sonnet-4-20250514"));
        assert_eq!(options.max_turns, Some(30));
        assert_eq!(options.allowed_tools, ["Read", "Write"]);
        assert_eq!(options.disallowed_tools, ["WebSearch"]);
        assert_eq!(options.cwd.as_deref(), Some(PathBuf::from("/tmp/sandbox/src").as_path()));
    }

    #[test]
    fn append_policy_maps_to_append_flag() {
        let mut req = request();
        req.system_prompt = SystemPromptPolicy::Append("Prefer small functions.".to_string());
        let options = build_options(&req);
        assert_eq!(options.system_prompt, None);
        assert_eq!(
            options.append_system_prompt.as_deref(),
            Some("Prefer small functions.")
        );
    }

    #[test]
    fn replace_policy_maps_to_system_prompt_flag() {
        let mut req = request();
        req.system_prompt = SystemPromptPolicy::Replace("You are a Go expert.".to_string());
        let options = build_options(&req);
        assert_eq!(options.system_prompt.as_deref(), Some("You are a Go expert."));
        assert_eq!(options.append_system_prompt, None);
    }

    #[test]
    fn permission_mode_defaults_to_dont_ask() {
        let options = build_options(&request());
        assert_eq!(options.permission_mode, PermissionMode::DontAsk);

        let mut req = request();
        req.permission_mode = Some("acceptEdits".to_string());
        assert_eq!(
            build_options(&req).permission_mode,
            PermissionMode::AcceptEdits
        );
    }

    fn outcome(stop: StopReason) -> RunOutcome {
        RunOutcome {
            session_id: "sess-1".to_string(),
            result_text: String::new(),
            total_cost_usd: 0.034,
            num_turns: 7,
            duration_ms: 1200,
            errors: Vec::new(),
            stop,
        }
    }

    #[test]
    fn completed_outcome_carries_its_cost() {
        match fold_outcome(outcome(StopReason::Completed)) {
            GenerateOutcome::Completed { cost_usd } => assert_eq!(cost_usd, Some(0.034)),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn error_outcome_reports_stop_reason_and_cost() {
        let mut run = outcome(StopReason::ExecutionError);
        run.errors.push("tool crashed".to_string());
        match fold_outcome(run) {
            GenerateOutcome::Failed { detail, cost_usd } => {
                assert_eq!(detail, "agent stopped after 7 turn(s): execution error: tool crashed");
                assert_eq!(cost_usd, Some(0.034));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn tool_target_prefers_command_and_truncates() {
        let input = serde_json::json!({"command": "go vet ./...", "path": "ignored"});
        assert_eq!(tool_target(&input), "go vet ./...");

        let long = serde_json::json!({"file_path": "x".repeat(200)});
        let shown = tool_target(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), 83);

        assert_eq!(tool_target(&serde_json::json!({"other": 1})), "");
    }
}
