// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! I/O streaming and output capture for processes.
//!
//! ```text
//! run_child() / run_child_with_cancellation()
//!   stdin task (optional)
//!   stdout/stderr reader tasks, line-buffered UTF-8
//!   mpsc channels buffer lines
//!   wait (or cancel/timeout)
//!   --> ProcessOutput { stdout, stderr, exit_code, interrupted }
//! ```

use crate::error::Result;
use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::builder::{ProcessBuilder, ProcessOutput, StreamFlags};

/// Spawns a reader task for stdout if needed.
fn spawn_stdout_reader(
    stdout: Option<ChildStdout>,
    flags: StreamFlags,
    name: &str,
    tx: mpsc::Sender<String>,
) -> Option<JoinHandle<()>> {
    if !flags.intersects(StreamFlags::FORWARD_TO_LOG | StreamFlags::KEEP_IN_STRING) {
        return None;
    }
    let name = name.to_string();
    stdout.map(|stdout| tokio::spawn(async move { read_stream(stdout, flags, &name, "stdout", tx).await }))
}

/// Spawns a reader task for stderr if needed.
fn spawn_stderr_reader(
    stderr: Option<ChildStderr>,
    flags: StreamFlags,
    name: &str,
    tx: mpsc::Sender<String>,
) -> Option<JoinHandle<()>> {
    if !flags.intersects(StreamFlags::FORWARD_TO_LOG | StreamFlags::KEEP_IN_STRING) {
        return None;
    }
    let name = name.to_string();
    stderr.map(|stderr| tokio::spawn(async move { read_stream(stderr, flags, &name, "stderr", tx).await }))
}

/// Collects output from a channel into a newline-joined string.
fn collect_output(rx: &mut mpsc::Receiver<String>, flags: StreamFlags) -> String {
    if !flags.contains(StreamFlags::KEEP_IN_STRING) {
        return String::new();
    }
    let mut output = String::new();
    while let Ok(line) = rx.try_recv() {
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&line);
    }
    output
}

/// Waits for reader tasks to complete.
async fn await_readers(stdout_handle: Option<JoinHandle<()>>, stderr_handle: Option<JoinHandle<()>>) {
    if let Some(handle) = stdout_handle {
        let _ = handle.await;
    }
    if let Some(handle) = stderr_handle {
        let _ = handle.await;
    }
}

impl ProcessBuilder {
    /// Runs the child process, handling I/O streaming and waiting for completion.
    pub(super) async fn run_child(&self, name: &str, child: &mut Child) -> Result<ProcessOutput> {
        let (stdout_tx, mut stdout_rx) = mpsc::channel::<String>(100);
        let (stderr_tx, mut stderr_rx) = mpsc::channel::<String>(100);

        let stdout_flags = self.stdout_config().flags();
        let stderr_flags = self.stderr_config().flags();

        let stdout_handle = spawn_stdout_reader(child.stdout.take(), stdout_flags, name, stdout_tx);
        let stderr_handle = spawn_stderr_reader(child.stderr.take(), stderr_flags, name, stderr_tx);

        self.write_stdin(name, child).await?;

        let exit_status = if let Some(timeout_duration) = self.timeout_duration() {
            tokio::select! {
                status = child.wait() => status?,
                () = tokio::time::sleep(timeout_duration) => {
                    warn!(process = %name, timeout = ?timeout_duration, "process timed out");
                    child.kill().await.with_context(|| format!("failed to kill process {name}"))?;
                    await_readers(stdout_handle, stderr_handle).await;
                    return Ok(ProcessOutput::new(
                        -1,
                        collect_output(&mut stdout_rx, stdout_flags),
                        collect_output(&mut stderr_rx, stderr_flags),
                        false,
                    ));
                }
            }
        } else {
            child.wait().await?
        };

        await_readers(stdout_handle, stderr_handle).await;

        Ok(ProcessOutput::new(
            exit_status.code().unwrap_or(-1),
            collect_output(&mut stdout_rx, stdout_flags),
            collect_output(&mut stderr_rx, stderr_flags),
            false,
        ))
    }

    /// Runs the child process with cancellation support.
    pub(super) async fn run_child_with_cancellation(
        &self,
        name: &str,
        child: &mut Child,
        token: CancellationToken,
    ) -> Result<ProcessOutput> {
        let (stdout_tx, mut stdout_rx) = mpsc::channel::<String>(100);
        let (stderr_tx, mut stderr_rx) = mpsc::channel::<String>(100);

        let stdout_flags = self.stdout_config().flags();
        let stderr_flags = self.stderr_config().flags();

        let stdout_handle = spawn_stdout_reader(child.stdout.take(), stdout_flags, name, stdout_tx);
        let stderr_handle = spawn_stderr_reader(child.stderr.take(), stderr_flags, name, stderr_tx);

        self.write_stdin(name, child).await?;

        let (exit_status, interrupted) = tokio::select! {
            status = child.wait() => (status?, false),
            () = token.cancelled() => {
                warn!(process = %name, "cancellation requested, killing process");
                child.kill().await.ok();
                let status = child.wait().await
                    .with_context(|| format!("failed waiting for process {name} to exit"))?;
                (status, true)
            }
        };

        await_readers(stdout_handle, stderr_handle).await;

        Ok(ProcessOutput::new(
            if interrupted { -1 } else { exit_status.code().unwrap_or(-1) },
            collect_output(&mut stdout_rx, stdout_flags),
            collect_output(&mut stderr_rx, stderr_flags),
            interrupted,
        ))
    }

    /// Writes stdin content to the child process if configured.
    async fn write_stdin(&self, name: &str, child: &mut Child) -> Result<()> {
        if let Some(stdin_content) = self.stdin_content()
            && let Some(mut stdin) = child.stdin.take()
        {
            use tokio::io::AsyncWriteExt;
            stdin
                .write_all(stdin_content.as_bytes())
                .await
                .with_context(|| format!("failed to write to stdin for process {name}"))?;
        }
        Ok(())
    }
}

/// Reads line-buffered UTF-8 text from a stream, logging and/or forwarding to a channel.
async fn read_stream<R>(reader: R, flags: StreamFlags, process_name: &str, stream_name: &str, tx: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if flags.contains(StreamFlags::FORWARD_TO_LOG) {
            trace!(process = %process_name, stream = %stream_name, line = %line, "output");
        }
        if flags.contains(StreamFlags::KEEP_IN_STRING) {
            let _ = tx.send(line).await;
        }
    }
}
