//! Bounded subprocess execution for scoring.
//!
//! The toolchain is an injected capability so the scoring pipeline can be
//! tested with scripted exit codes instead of a real compiler. The production
//! implementation shells out to the Go toolchain. All commands here are
//! deliberately synchronous; callers inside the async runner wrap them in
//! `spawn_blocking`. They carry their own short timeout, separate from the
//! agent's budget, since a hung compiler is a different failure mode than a
//! slow agent and should fail fast.

use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Exit status plus combined, tail-capped output of one command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

/// The build/static-analysis commands and the assertion-suite launcher.
pub trait Toolchain: Send + Sync {
    /// Compile the artifact directory. Nonzero exit is a failure.
    fn build(&self, dir: &Path) -> CommandOutcome;
    /// Static analysis over the artifact directory.
    fn vet(&self, dir: &Path) -> CommandOutcome;
    /// Run a fixture's assertion suite with `dir` as its working directory.
    /// The suite is opaque: exit 0 means every assertion held.
    fn checks(&self, suite: &Path, dir: &Path) -> CommandOutcome;
}

// ---------------------------------------------------------------------------
// GoToolchain
// ---------------------------------------------------------------------------

pub struct GoToolchain {
    timeout: Duration,
}

impl GoToolchain {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GoToolchain {
    fn default() -> Self {
        // Generous enough for a cold module download, still far below any
        // realistic agent budget.
        Self::new(Duration::from_secs(120))
    }
}

impl Toolchain for GoToolchain {
    fn build(&self, dir: &Path) -> CommandOutcome {
        run_shell("go build ./...", dir, Some(self.timeout))
    }

    fn vet(&self, dir: &Path) -> CommandOutcome {
        run_shell("go vet ./...", dir, Some(self.timeout))
    }

    fn checks(&self, suite: &Path, dir: &Path) -> CommandOutcome {
        // Invoked through sh so the suite does not need an executable bit.
        let mut cmd = Command::new("sh");
        cmd.arg(suite).current_dir(dir);
        run_command(cmd, Some(self.timeout))
    }
}

// ---------------------------------------------------------------------------
// Bounded execution
// ---------------------------------------------------------------------------

/// Run a shell command line with an optional timeout.
///
/// `None` means wait indefinitely.
pub fn run_shell(command: &str, cwd: &Path, timeout: Option<Duration>) -> CommandOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    run_command(cmd, timeout)
}

/// Run a prepared command to completion, with an optional timeout.
///
/// Uses dedicated threads for stdout/stderr reading (avoiding pipe-buffer
/// deadlocks) and a waiter thread with `mpsc::recv_timeout` for timeout
/// support (no busy-wait).
fn run_command(mut cmd: Command, timeout: Option<Duration>) -> CommandOutcome {
    let mut child = match cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(c) => c,
        Err(e) => {
            return CommandOutcome {
                success: false,
                output: format!("failed to spawn: {e}"),
            }
        }
    };

    let child_pid = child.id();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stdout_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || -> String {
        let mut buf = String::new();
        if let Some(mut r) = stderr_handle {
            use std::io::Read;
            let _ = r.read_to_string(&mut buf);
        }
        buf
    });

    let wait_result = match timeout {
        None => child.wait(),
        Some(timeout_dur) => {
            // The child is moved to a waiter thread; on timeout we kill by
            // PID. The waiter unblocks once the killed process exits and the
            // reader threads see EOF on the closed pipes.
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });

            match rx.recv_timeout(timeout_dur) {
                Ok(result) => result,
                Err(_) => {
                    kill_process(child_pid);
                    let secs = timeout_dur.as_secs();
                    return CommandOutcome {
                        success: false,
                        output: format!("timed out after {secs}s"),
                    };
                }
            }
        }
    };

    let stdout_buf = stdout_thread.join().unwrap_or_default();
    let stderr_buf = stderr_thread.join().unwrap_or_default();

    let status = match wait_result {
        Ok(s) => s,
        Err(e) => {
            return CommandOutcome {
                success: false,
                output: format!("wait failed: {e}"),
            }
        }
    };

    format_outcome(status.success(), &stdout_buf, &stderr_buf)
}

/// Combine stdout/stderr and cap to 10KB, keeping the tail.
fn format_outcome(success: bool, stdout: &str, stderr: &str) -> CommandOutcome {
    let output = if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    };
    const MAX_OUTPUT: usize = 10 * 1024;
    let trimmed = output.trim();
    let capped = if trimmed.len() > MAX_OUTPUT {
        // Round the cut forward to a char boundary so multibyte output
        // cannot split mid-character.
        let mut cut = trimmed.len() - MAX_OUTPUT;
        while !trimmed.is_char_boundary(cut) {
            cut += 1;
        }
        &trimmed[cut..]
    } else {
        trimmed
    };
    CommandOutcome {
        success,
        output: capped.to_string(),
    }
}

/// Terminate a process by PID using SIGKILL. Best-effort.
fn kill_process(pid: u32) {
    let _ = Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
