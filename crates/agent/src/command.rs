//! Bounded execution of the vendor tools (`ipmitool`, `smartctl`).
//!
//! Every sensor read and fan command goes through [`run_tool`], which
//! captures stdout/stderr and kills the child if it does not finish within
//! the configured timeout. A wedged BMC must never stall the control loop
//! indefinitely.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (1 MiB).
const MAX_OUTPUT_BYTES: u64 = 1024 * 1024;

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ToolOutput {
    /// Turn a non-zero exit into [`CommandError::ExitStatus`].
    pub fn into_success(self) -> Result<Self, CommandError> {
        if self.exit_code == 0 {
            Ok(self)
        } else {
            Err(CommandError::ExitStatus {
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Errors from spawning or waiting on a tool.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("exited with code {exit_code}: {stderr}")]
    ExitStatus { exit_code: i32, stderr: String },
}

/// Run `program args...` and wait at most `timeout` for it to exit.
///
/// A non-zero exit code is *not* an error here; callers decide what the
/// exit code means for their tool.
pub async fn run_tool<S: AsRef<str>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> Result<ToolOutput, CommandError> {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the child on timeout kills it.
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Streams are drained under the same deadline as the exit: a forked
    // grandchild can hold the pipes open after the tool itself exits.
    let finished = async {
        let (status, stdout_bytes, stderr_bytes) =
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr));
        status.map(|status| (status, stdout_bytes, stderr_bytes))
    };

    match tokio::time::timeout(timeout, finished).await {
        Ok(Ok((status, stdout_bytes, stderr_bytes))) => {
            let output = ToolOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: start.elapsed().as_millis() as u64,
            };
            tracing::trace!(
                program,
                exit_code = output.exit_code,
                duration_ms = output.duration_ms,
                "Tool finished",
            );
            Ok(output)
        }
        Ok(Err(source)) => Err(CommandError::Spawn {
            program: program.to_string(),
            source,
        }),
        Err(_elapsed) => Err(CommandError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_OUTPUT_BYTES).read_to_end(&mut buf).await;
    }
    buf
}
