//! Helpers for running child processes with timeouts and bounded output.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, error, instrument, warn};

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    /// `None` when the child was killed after a timeout.
    pub status: Option<ExitStatus>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|status| status.success())
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stdout_truncated_notice(&self, label: &str) -> String {
        if self.stdout_truncated > 0 {
            format!(
                "\n[{label} stdout truncated {} bytes]\n",
                self.stdout_truncated
            )
        } else {
            String::new()
        }
    }

    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is written and both pipes are drained concurrently while the child
/// runs. `output_limit_bytes` bounds the stdout/stderr kept in memory; bytes
/// beyond it are discarded while the pipe keeps draining. On timeout the child
/// is killed and the result carries `timed_out` with no status and no output.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub async fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let child_stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let write_stdin = async move {
        if let (Some(mut pipe), Some(input)) = (child_stdin, stdin) {
            // A child that exits without reading stdin closes the pipe early.
            if let Err(e) = pipe.write_all(input).await {
                warn!(err = %e, "failed to write stdin");
            }
            drop(pipe);
        }
    };

    let collect = async {
        let ((), stdout, stderr, status) = tokio::join!(
            write_stdin,
            read_stream_limited(stdout, output_limit_bytes),
            read_stream_limited(stderr, output_limit_bytes),
            child.wait(),
        );
        (stdout, stderr, status)
    };

    let outcome = tokio::time::timeout(timeout, collect).await;
    let (stdout, stderr, status, timed_out) = match outcome {
        Ok((stdout, stderr, status)) => {
            let status = status.context("wait for command")?;
            (stdout?, stderr?, Some(status), false)
        }
        Err(_) => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().await.context("kill command")?;
            ((Vec::new(), 0), (Vec::new(), 0), None, true)
        }
    };
    let (stdout, stdout_truncated) = stdout;
    let (stderr, stderr_truncated) = stderr;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.and_then(|s| s.code()), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

async fn read_stream_limited<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await.context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
