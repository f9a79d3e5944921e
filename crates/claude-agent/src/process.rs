use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::types::{Message, PermissionMode, QueryOptions};
use crate::{ClaudeAgentError, Result};

// ─── ClaudeProcess ────────────────────────────────────────────────────────

/// A running `claude --output-format stream-json --input-format stream-json`
/// subprocess using bidirectional streaming.
///
/// The prompt is sent as a JSON message on stdin, and responses are read as
/// JSONL from stdout. Stderr is captured in a background task and surfaced
/// on process exit errors.
pub(crate) struct ClaudeProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    /// Stderr output collected by a background reader task.
    stderr_buf: Arc<Mutex<String>>,
    /// Handle for the stderr reader; awaited before the buffer is read so
    /// exit errors always carry the complete stderr.
    stderr_task: Option<tokio::task::JoinHandle<()>>,
}

impl ClaudeProcess {
    /// Spawn the real `claude` binary with the given prompt and options.
    ///
    /// The prompt is sent as a user message on stdin, then stdin is closed
    /// for single-turn operation.
    ///
    /// `CLAUDECODE` is removed from the environment so spawning works both
    /// from a terminal and from inside a running Claude session.
    pub(crate) async fn spawn(prompt: &str, opts: &QueryOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        cmd.env_remove("CLAUDECODE");

        // Apply additional env vars from options
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut process = Self::from_command(cmd)?;

        // Send the initial prompt as a user message via stdin
        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        process.send_message(&user_msg).await?;
        process.close_stdin();

        Ok(process)
    }

    /// Spawn an arbitrary command as a mock Claude process.
    /// Used in unit tests to inject a command that emits fixed JSON lines.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop: if the owning task is dropped without running the
            // normal kill path, the runtime still reaps the subprocess.
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(ClaudeAgentError::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeAgentError::Process("stdout not captured".into()))?;

        let stdin = child.stdin.take();

        // Drain stderr into a buffer from a background task so it can be
        // attached to process exit errors.
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        let stderr_task = child.stderr.take().map(|stderr| {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            })
        });

        let lines = BufReader::new(stdout).lines();
        Ok(Self {
            child,
            lines,
            stdin,
            stderr_buf,
            stderr_task,
        })
    }

    /// OS process id, if the child is still running.
    #[cfg(test)]
    pub(crate) fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Write a JSON message to the subprocess stdin.
    pub(crate) async fn send_message(&mut self, msg: &serde_json::Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeAgentError::Process("stdin already closed".into()))?;

        let mut buf = serde_json::to_vec(msg).map_err(|e| {
            ClaudeAgentError::Process(format!("failed to serialize stdin message: {e}"))
        })?;
        buf.push(b'\n');

        stdin.write_all(&buf).await.map_err(ClaudeAgentError::Io)?;
        stdin.flush().await.map_err(ClaudeAgentError::Io)?;

        Ok(())
    }

    /// Close stdin, signalling no more input (single-turn mode).
    pub(crate) fn close_stdin(&mut self) {
        self.stdin.take();
    }

    /// Read the next non-empty JSONL line from stdout and deserialize it.
    ///
    /// Lines with a `"type"` this crate does not model (tool progress, auth
    /// status, future additions) are skipped rather than failing the stream.
    ///
    /// Returns `Ok(None)` on EOF (process exited).
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            match self.lines.next_line().await {
                Err(e) => return Err(ClaudeAgentError::Io(e)),
                Ok(None) => return Ok(None),
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Message>(trimmed) {
                        Ok(msg) => return Ok(Some(msg)),
                        Err(e) => {
                            if let Some(ty) = unmodelled_message_type(trimmed) {
                                debug!(message_type = %ty, "skipping unmodelled stream-json message");
                                continue;
                            }
                            return Err(ClaudeAgentError::Parse {
                                line: trimmed.to_owned(),
                                source: e,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Wait for the child to exit and return an error if the exit code is
    /// non-zero or the process was killed by a signal. Captured stderr is
    /// included in the error message.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<ClaudeAgentError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(ClaudeAgentError::Io(e)),
        };

        if status.success() {
            return None;
        }

        // The child has exited, so its stderr pipe is at EOF and the reader
        // task finishes promptly.
        if let Some(task) = self.stderr_task.take() {
            let _ = task.await;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let msg = if let Some(code) = status.code() {
            if stderr.is_empty() {
                format!("claude process exited with code {code}")
            } else {
                format!("claude process exited with code {code}\nstderr: {stderr}")
            }
        } else {
            // Killed by signal (Unix)
            if stderr.is_empty() {
                "claude process terminated by signal".to_string()
            } else {
                format!("claude process terminated by signal\nstderr: {stderr}")
            }
        };

        Some(ClaudeAgentError::Process(msg))
    }

    /// Kill the subprocess and reap it (best-effort; errors are ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// If `line` is valid JSON carrying a `"type"` field, return that type.
///
/// Such lines are protocol messages this crate chooses not to model, safe
/// to skip. Anything else is a genuine parse error.
fn unmodelled_message_type(line: &str) -> Option<String> {
    let v = serde_json::from_str::<serde_json::Value>(line).ok()?;
    v.get("type")
        .and_then(|t| t.as_str())
        .map(|t| t.to_owned())
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(opts: &QueryOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);

    // Bidirectional streaming protocol. Session persistence is disabled
    // unconditionally: every query is an isolated, fresh conversation.
    cmd.arg("--output-format")
        .arg("stream-json")
        .arg("--verbose")
        .arg("--input-format")
        .arg("stream-json")
        .arg("--no-session-persistence");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if !opts.allowed_tools.is_empty() {
        cmd.arg("--allowed-tools").args(&opts.allowed_tools);
    }

    if !opts.disallowed_tools.is_empty() {
        cmd.arg("--disallowed-tools").args(&opts.disallowed_tools);
    }

    if opts.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(opts.permission_mode.as_str());
    }

    if let Some(sp) = &opts.system_prompt {
        cmd.arg("--system-prompt").arg(sp);
    }

    if let Some(append) = &opts.append_system_prompt {
        cmd.arg("--append-system-prompt").arg(append);
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    // NOTE: prompt is NOT a positional arg. It's sent via stdin.

    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────
