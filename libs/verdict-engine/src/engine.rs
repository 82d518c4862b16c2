/// Execution Engine - Runs One Solution Process Per Case
///
/// **Core Responsibility:**
/// Launch the solution, feed it one fixture's input, capture raw output.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (local child processes)
/// - Engine does NOT compare output
/// - Engine does NOT decide verdicts
/// - Engine returns raw outputs for the Evaluator to judge
///
/// **Process Rules:**
/// 1. No arguments beyond what identifies the program
/// 2. Whole input written to stdin, then stdin closed
/// 3. stdout and stderr drained concurrently into separate buffers
/// 4. Hard wall-clock timeout; the child is killed on expiry
/// 5. Partial stdout is kept when a case times out

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};
use verdict_common::config::{CommandTemplate, HarnessConfig};

/// How long to keep draining pipes after the child has gone away.
/// A grandchild that inherited stdout can otherwise hold the pipe open.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Program plus arguments identifying the solution to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTarget {
    pub program: String,
    pub args: Vec<String>,
}

impl ExecutionTarget {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_template(template: &CommandTemplate, vars: &[(&str, &Path)]) -> Self {
        let (program, args) = template.render(vars);
        Self::new(program, args)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl From<&HarnessConfig> for ExecutionLimits {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            timeout: config.case_timeout(),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// Raw execution output for a single case
/// Produced by the engine, consumed by the evaluator
#[derive(Debug, Clone, Default)]
pub struct CaseExecutionOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub stdout_truncated: bool,
    /// Set when the process could not be started at all
    pub spawn_error: Option<String>,
}

impl CaseExecutionOutput {
    fn spawn_failure(message: String) -> Self {
        Self {
            spawn_error: Some(message),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Read a pipe to the end, keeping at most `limit` bytes.
/// Bytes past the limit are drained and dropped so the child never blocks.
/// A message on `stop` ends the read early with whatever was captured.
async fn read_capped<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
    mut stop: oneshot::Receiver<()>,
) -> Captured {
    let mut captured = Captured::default();
    let Some(mut reader) = reader else {
        return captured;
    };

    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let read = tokio::select! {
            biased;
            read = reader.read(&mut chunk) => read,
            _ = &mut stop => break,
        };

        match read {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.bytes.extend_from_slice(&chunk[..room]);
                    captured.truncated = true;
                } else {
                    captured.bytes.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) => {
                debug!(error = %e, "Pipe read failed");
                break;
            }
        }
    }
    captured
}

/// Pipe reader running on its own task
struct CaptureTask {
    handle: JoinHandle<Captured>,
    stop: oneshot::Sender<()>,
}

impl CaptureTask {
    fn spawn<R>(reader: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(read_capped(reader, limit, stop_rx));
        Self { handle, stop }
    }

    /// Collect the buffer once the process is gone
    async fn finish(mut self, stream: &str) -> Captured {
        let joined = match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut self.handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(stream, "Pipe still open after process exit, keeping partial output");
                let _ = self.stop.send(());
                self.handle.await
            }
        };

        joined.unwrap_or_else(|e| {
            warn!(stream, error = %e, "Capture task failed");
            Captured::default()
        })
    }
}

/// Local child-process execution engine
pub struct ProcessEngine {
    limits: ExecutionLimits,
}

impl ProcessEngine {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    /// Run the target once with `input` on stdin
    ///
    /// Never fails: spawn errors, timeouts and crashes are all reported in
    /// the returned output so the caller can keep going with later cases.
    #[instrument(skip(self, input), fields(program = %target.program, input_bytes = input.len()))]
    pub async fn execute(&self, target: &ExecutionTarget, input: &str) -> CaseExecutionOutput {
        let start_time = Instant::now();

        let mut command = Command::new(&target.program);
        command
            .args(&target.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to spawn solution process");
                return CaseExecutionOutput::spawn_failure(format!(
                    "failed to start '{}': {}",
                    target.program, e
                ));
            }
        };

        // Feed stdin from its own task so a child that never reads cannot
        // stall output collection. Dropping the handle closes the pipe.
        let stdin = child.stdin.take();
        let input_bytes = input.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(&input_bytes).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        debug!(error = %e, "Failed to write solution stdin");
                    }
                }
            }
        });

        let limit = self.limits.max_output_bytes;
        let stdout_task = CaptureTask::spawn(child.stdout.take(), limit);
        let stderr_task = CaptureTask::spawn(child.stderr.take(), limit);

        let mut timed_out = false;
        let exit_code = match tokio::time::timeout(self.limits.timeout, child.wait()).await {
            Ok(Ok(status)) => status.code(),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to wait for solution process");
                None
            }
            Err(_) => {
                timed_out = true;
                warn!(
                    timeout_ms = self.limits.timeout.as_millis() as u64,
                    "Solution timed out, killing process"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed-out process");
                }
                None
            }
        };

        let writer_abort = writer.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_GRACE, writer).await.is_err() {
            writer_abort.abort();
            debug!("stdin still blocked after process exit");
        }

        let stdout = stdout_task.finish("stdout").await;
        let mut stderr = stderr_task.finish("stderr").await;

        if timed_out {
            stderr.bytes.extend_from_slice(b"\n[Execution timed out]");
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;

        debug!(
            duration_ms,
            exit_code = ?exit_code,
            timed_out,
            stdout_bytes = stdout.bytes.len(),
            stderr_bytes = stderr.bytes.len(),
            "Process finished"
        );

        CaseExecutionOutput {
            stdout: String::from_utf8_lossy(&stdout.bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.bytes).into_owned(),
            exit_code,
            duration_ms,
            timed_out,
            stdout_truncated: stdout.truncated,
            spawn_error: None,
        }
    }
}
