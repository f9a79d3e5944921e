use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ─── Outer Message enum ───────────────────────────────────────────────────

/// Messages emitted by `claude --output-format stream-json`, discriminated
/// by the JSON `"type"` field.
///
/// Only the message types the harness consumes are modelled here. Lines
/// carrying any other `"type"` (tool progress, auth status, partial chunks)
/// are skipped at the process layer before deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::System(m) => &m.session_id,
            Message::Assistant(m) => &m.session_id,
            Message::User(m) => &m.session_id,
            Message::Result(m) => m.session_id(),
        }
    }

    /// Returns `Some(&ResultMessage)` if this is the terminal result message.
    pub fn as_result(&self) -> Option<&ResultMessage> {
        if let Message::Result(r) = self {
            Some(r)
        } else {
            None
        }
    }
}

// ─── System messages ──────────────────────────────────────────────────────

/// `type = "system"`, further distinguished by `subtype`.
///
/// Uses `#[serde(flatten)]` so the inner `SystemPayload` enum (tagged by
/// `subtype`) consumes the remaining fields after `session_id`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub session_id: String,
    #[serde(flatten)]
    pub payload: SystemPayload,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum SystemPayload {
    /// First message of every stream: model, tool list, permission mode.
    Init(SystemInit),
    /// Any other system subtype (status updates, compaction boundaries).
    #[serde(other)]
    Unknown,
}

/// The `init` payload. Extra fields the CLI adds over time are ignored.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemInit {
    pub model: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Permission mode. The CLI sends camelCase (`permissionMode`) in some versions.
    #[serde(alias = "permissionMode")]
    pub permission_mode: String,
    pub claude_code_version: String,
    pub cwd: String,
}

// ─── Assistant messages ───────────────────────────────────────────────────

/// `type = "assistant"`: the model's response, including content blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    pub parent_tool_use_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantContent {
    pub id: String,
    pub role: String,
    pub content: Vec<ContentBlock>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

/// Content blocks within an assistant message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool inputs are schema-polymorphic; each tool defines its own shape.
        input: serde_json::Value,
    },
    Thinking {
        thinking: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

// ─── User messages ────────────────────────────────────────────────────────

/// `type = "user"`: tool results fed back to the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMessage {
    pub message: UserContent,
    pub parent_tool_use_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserContent {
    pub role: String,
    pub content: Vec<UserContentBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContentBlock {
    Text {
        text: String,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Vec<ToolResultContent>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
}

// ─── Result messages ──────────────────────────────────────────────────────

/// `type = "result"`: the terminal message in every query stream.
///
/// `subtype` distinguishes success from the error conditions that can occur
/// with the flags this driver passes (`error_max_turns` from `--max-turns`,
/// `error_during_execution` from tool or API failures).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ResultMessage {
    Success(ResultSuccess),
    ErrorDuringExecution(ResultError),
    ErrorMaxTurns(ResultError),
}

impl ResultMessage {
    pub fn session_id(&self) -> &str {
        match self {
            ResultMessage::Success(r) => &r.session_id,
            ResultMessage::ErrorDuringExecution(r) | ResultMessage::ErrorMaxTurns(r) => {
                &r.session_id
            }
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, ResultMessage::Success(_))
    }

    /// The final result text. `None` for error subtypes.
    pub fn result_text(&self) -> Option<&str> {
        if let ResultMessage::Success(r) = self {
            Some(&r.result)
        } else {
            None
        }
    }

    pub fn total_cost_usd(&self) -> f64 {
        match self {
            ResultMessage::Success(r) => r.total_cost_usd,
            ResultMessage::ErrorDuringExecution(r) | ResultMessage::ErrorMaxTurns(r) => {
                r.total_cost_usd
            }
        }
    }

    pub fn num_turns(&self) -> u32 {
        match self {
            ResultMessage::Success(r) => r.num_turns,
            ResultMessage::ErrorDuringExecution(r) | ResultMessage::ErrorMaxTurns(r) => r.num_turns,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            ResultMessage::Success(r) => r.duration_ms,
            ResultMessage::ErrorDuringExecution(r) | ResultMessage::ErrorMaxTurns(r) => {
                r.duration_ms
            }
        }
    }

    /// Error strings reported by the CLI. Empty for success.
    pub fn errors(&self) -> &[String] {
        match self {
            ResultMessage::Success(_) => &[],
            ResultMessage::ErrorDuringExecution(r) | ResultMessage::ErrorMaxTurns(r) => &r.errors,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultSuccess {
    pub session_id: String,
    pub result: String,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub is_error: bool,
    pub num_turns: u32,
    pub stop_reason: Option<String>,
    pub total_cost_usd: f64,
    pub usage: ResultUsage,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultError {
    pub session_id: String,
    pub duration_ms: u64,
    pub duration_api_ms: u64,
    pub is_error: bool,
    pub num_turns: u32,
    pub stop_reason: Option<String>,
    pub total_cost_usd: f64,
    pub usage: ResultUsage,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Options for driving a Claude subprocess query.
///
/// This covers the single-shot, non-interactive surface: model selection,
/// turn limit, tool policy, system prompt control, and the working
/// directory the agent operates in. Session persistence is always disabled;
/// every query is a fresh conversation.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Claude model name (e.g. `"claude-sonnet-4-20250514"`).
    pub model: Option<String>,
    /// Maximum number of agentic turns before stopping with `error_max_turns`.
    pub max_turns: Option<u32>,
    /// Tool names that are auto-approved without prompting.
    pub allowed_tools: Vec<String>,
    /// Tool names that are explicitly disallowed.
    pub disallowed_tools: Vec<String>,
    /// Permission mode for tool execution.
    pub permission_mode: PermissionMode,
    /// Replace the default system prompt entirely.
    pub system_prompt: Option<String>,
    /// Text appended to the default system prompt.
    pub append_system_prompt: Option<String>,
    /// Working directory for the subprocess (default: current dir).
    pub cwd: Option<std::path::PathBuf>,
    /// Additional environment variables for the subprocess.
    pub env: HashMap<String, String>,
    /// Custom path to the `claude` binary (default: `"claude"`).
    pub path_to_executable: Option<String>,
}

/// Permission mode controlling how tool executions are authorized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Standard: prompts for dangerous operations.
    #[default]
    Default,
    /// Auto-accept file edit operations.
    AcceptEdits,
    /// Bypass all permission checks.
    BypassPermissions,
    /// Planning mode, no actual tool execution.
    Plan,
    /// Don't prompt; deny anything not pre-approved.
    DontAsk,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
            PermissionMode::DontAsk => "dontAsk",
        }
    }

    /// Parse the camelCase CLI spelling (e.g. `"acceptEdits"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(PermissionMode::Default),
            "acceptEdits" => Some(PermissionMode::AcceptEdits),
            "bypassPermissions" => Some(PermissionMode::BypassPermissions),
            "plan" => Some(PermissionMode::Plan),
            "dontAsk" => Some(PermissionMode::DontAsk),
            _ => None,
        }
    }
}
