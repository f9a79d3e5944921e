use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tracing::debug;

use crate::process::ClaudeProcess;
use crate::types::{Message, QueryOptions};
use crate::Result;

// ─── QueryStream ──────────────────────────────────────────────────────────

/// An async stream of [`Message`]s from a Claude subprocess.
///
/// Backed by a Tokio mpsc channel. A background task owns [`ClaudeProcess`]
/// and forwards messages until it sees the terminal `Result` message or the
/// process exits. Dropping `QueryStream` closes the receiver; the background
/// task notices and kills the subprocess, so cancelling a query (for example
/// from a timeout) tears the whole thing down rather than orphaning it.
///
/// ```rust,ignore
/// use claude_agent::{query, Message, QueryOptions};
/// use futures::StreamExt;
///
/// let mut stream = query("say hello", QueryOptions::default());
/// while let Some(msg) = stream.next().await {
///     if let Ok(Message::Result(r)) = msg {
///         println!("result: {:?}", r.result_text());
///     }
/// }
/// ```
pub struct QueryStream {
    rx: mpsc::Receiver<Result<Message>>,
}

impl QueryStream {
    pub(crate) fn new(prompt: String, opts: QueryOptions) -> Self {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let process = match ClaudeProcess::spawn(&prompt, &opts).await {
                Ok(p) => p,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            pump(process, tx).await;
        });

        QueryStream { rx }
    }

    /// Test-only constructor: run the real pump over an already-spawned
    /// process, so tests exercise the same forwarding and kill paths.
    #[cfg(test)]
    pub(crate) fn from_process(process: ClaudeProcess) -> Self {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump(process, tx));
        QueryStream { rx }
    }

    /// Test-only constructor: wrap a raw mpsc receiver as a `QueryStream`.
    /// Used by `runner` tests to inject pre-built message sequences.
    #[cfg(test)]
    pub(crate) fn from_channel(rx: mpsc::Receiver<Result<Message>>) -> Self {
        Self { rx }
    }
}

impl Stream for QueryStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Forward messages from the subprocess into the channel.
///
/// Exits on the terminal `Result` message, on error, on EOF, or as soon as
/// the receiver is dropped. Always kills and reaps the subprocess on the way
/// out; `wait_exit_error` is only consulted on the EOF path, where the child
/// has already exited and waiting cannot block.
async fn pump(mut process: ClaudeProcess, tx: mpsc::Sender<Result<Message>>) {
    loop {
        tokio::select! {
            _ = tx.closed() => {
                debug!("query stream dropped; killing claude subprocess");
                break;
            }
            next = process.next_message() => match next {
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
                Ok(None) => {
                    // EOF before any result message: surface the exit status
                    // and captured stderr instead of ending silently.
                    if let Some(exit_err) = process.wait_exit_error().await {
                        let _ = tx.send(Err(exit_err)).await;
                    }
                    break;
                }
                Ok(Some(msg)) => {
                    let terminal = matches!(msg, Message::Result(_));
                    if tx.send(Ok(msg)).await.is_err() || terminal {
                        break;
                    }
                }
            }
        }
    }

    process.kill().await;
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultMessage;
    use futures::StreamExt;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::process::Command;

    /// Write JSON lines to a temp file, then `cat` it as the mock process.
    fn mock_stream(lines: &[&str]) -> QueryStream {
        let mut f = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        let path = f.path().to_owned();
        // Keep the file alive for the duration of the test
        std::mem::forget(f);

        let mut cmd = Command::new("cat");
        cmd.arg(&path);
        QueryStream::from_process(ClaudeProcess::spawn_command(cmd).unwrap())
    }

    fn pid_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    const INIT_LINE: &str = r#"{"type":"system","subtype":"init","session_id":"s1","model":"m","tools":[],"permission_mode":"default","claude_code_version":"0.0.0","cwd":"/tmp"}"#;
    const RESULT_LINE: &str = r#"{"type":"result","subtype":"success","session_id":"s1","result":"Hello from mock!","duration_ms":1,"duration_api_ms":1,"is_error":false,"num_turns":1,"stop_reason":"end_turn","total_cost_usd":0.0,"usage":{"input_tokens":1,"output_tokens":1}}"#;

    #[tokio::test]
    async fn stream_yields_all_messages() {
        let stream = mock_stream(&[INIT_LINE, RESULT_LINE]);
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.is_ok()));
    }

    #[tokio::test]
    async fn stream_terminates_after_result() {
        // Add an extra line after result; the stream must not emit it
        let extra = INIT_LINE;
        let stream = mock_stream(&[INIT_LINE, RESULT_LINE, extra]);
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn stream_last_message_is_result() {
        let stream = mock_stream(&[INIT_LINE, RESULT_LINE]);
        let messages: Vec<_> = stream.collect().await;
        let last = messages.last().unwrap().as_ref().unwrap();
        assert!(matches!(last, Message::Result(ResultMessage::Success(_))));
    }

    #[tokio::test]
    async fn stream_extracts_session_id_and_result_text() {
        let stream = mock_stream(&[INIT_LINE, RESULT_LINE]);
        let messages: Vec<_> = stream.collect().await;

        let first = messages[0].as_ref().unwrap();
        assert_eq!(first.session_id(), "s1");

        let last = messages.last().unwrap().as_ref().unwrap();
        if let Message::Result(r) = last {
            assert_eq!(r.result_text(), Some("Hello from mock!"));
            assert_eq!(r.session_id(), "s1");
        } else {
            panic!("expected Result");
        }
    }

    #[tokio::test]
    async fn stream_handles_empty_lines_in_output() {
        let stream = mock_stream(&[INIT_LINE, "", "  ", RESULT_LINE]);
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn stream_skips_unmodelled_message_types() {
        let progress = r#"{"type":"tool_progress","tool_use_id":"t1","tool_name":"Bash","elapsed_time_seconds":1.5,"session_id":"s1"}"#;
        let stream = mock_stream(&[INIT_LINE, progress, RESULT_LINE]);
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.is_ok()));
    }

    #[tokio::test]
    async fn stream_surfaces_nonzero_exit_with_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 3");
        let stream = QueryStream::from_process(ClaudeProcess::spawn_command(cmd).unwrap());
        let messages: Vec<_> = stream.collect().await;
        assert_eq!(messages.len(), 1);
        let err = messages[0].as_ref().unwrap_err().to_string();
        assert!(err.contains("code 3"), "unexpected error: {err}");
        assert!(err.contains("boom"), "stderr missing: {err}");
    }

    #[tokio::test]
    async fn dropping_stream_kills_subprocess() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("echo '{INIT_LINE}'; exec sleep 600"));
        let process = ClaudeProcess::spawn_command(cmd).unwrap();
        let pid = process.id().expect("child should have a pid");

        let mut stream = QueryStream::from_process(process);
        let first = stream.next().await;
        assert!(first.is_some(), "expected the init message");

        drop(stream);

        // The pump sees the closed channel on its next loop turn and kills
        // the child; poll briefly for the pid to disappear.
        let mut alive = pid_alive(pid);
        for _ in 0..100 {
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            alive = pid_alive(pid);
        }
        assert!(!alive, "subprocess {pid} still alive after stream drop");
    }
}
