//! Native Rust driver for the Claude CLI subprocess.
//!
//! Implements the `--output-format stream-json` protocol as a first-class
//! Rust library, so a harness can drive single-shot agentic queries without
//! a Node.js runtime. Every query is a fresh, non-persistent conversation:
//! the caller supplies the prompt, the tool policy, and the system prompt
//! control, and consumes typed messages until the terminal result.
//!
//! # Architecture
//!
//! ```text
//! QueryOptions
//!     │
//!     ▼
//! ClaudeProcess   ← spawns `claude --output-format stream-json …`
//!     │              prompt via stdin, JSONL from stdout
//!     ▼
//! QueryStream     ← implements futures::Stream<Item = Result<Message>>
//!     │              background task + mpsc channel; dropping the stream
//!     │              kills the subprocess
//!     ▼
//! collect_with    ← folds the stream into a RunOutcome, observing each
//!                    message on the way through
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{collect, query, QueryOptions};
//!
//! let opts = QueryOptions {
//!     model: Some("claude-sonnet-4-20250514".into()),
//!     max_turns: Some(10),
//!     ..Default::default()
//! };
//!
//! let outcome = collect(query("Write a hello-world Go program.", opts)).await?;
//! println!("{}", outcome.result_text);
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;
pub mod stream;


pub use error::ClaudeAgentError;
pub use runner::{collect, collect_with, RunOutcome, StopReason};
pub use stream::QueryStream;
pub use types::{
    AssistantContent, AssistantMessage, ContentBlock, Message, PermissionMode, QueryOptions,
    ResultError, ResultMessage, ResultSuccess, SystemMessage, SystemPayload, TokenUsage,
    UserContentBlock, UserMessage,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;

/// Start a single agentic query against the Claude CLI.
///
/// Returns a [`QueryStream`] that yields [`Message`] values as they arrive
/// from the subprocess. The stream terminates after the first
/// [`Message::Result`] or on process exit; dropping it early kills the
/// subprocess.
///
/// # Example
///
/// ```rust,ignore
/// use claude_agent::{query, Message, QueryOptions};
/// use futures::StreamExt;
///
/// let stream = query("say hello", QueryOptions::default());
/// let messages: Vec<_> = stream.collect().await;
/// ```
pub fn query(prompt: impl Into<String>, opts: QueryOptions) -> QueryStream {
    QueryStream::new(prompt.into(), opts)
}
