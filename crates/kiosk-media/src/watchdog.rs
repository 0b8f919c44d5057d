//! Timeout supervision of one external process.
//!
//! [`ProcessWatchdog`] runs a single invocation and settles exactly once:
//! either the process exits first, or the deadline fires first and the whole
//! process tree is torn down. Platform differences live behind
//! [`TreeTerminator`] so callers never branch on the host OS.

use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use kiosk_models::EncodingResult;

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};
use crate::telemetry;

/// Number of diagnostic stderr lines kept for error reports.
pub const STDERR_TAIL_LINES: usize = 20;

/// How long to wait for the stderr reader after the process settled.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Terminates a process together with everything it spawned.
pub trait TreeTerminator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Ask the tree rooted at `pid` to exit.
    fn terminate(&self, pid: u32) -> io::Result<()>;

    /// Force the tree rooted at `pid` to exit.
    fn kill(&self, pid: u32) -> io::Result<()>;
}

/// Signals the child's process group (the child is spawned as group leader).
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalTerminator;

#[cfg(unix)]
impl SignalTerminator {
    fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> io::Result<()> {
        let pgid = i32::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pgid), signal).map_err(io::Error::from)
    }
}

#[cfg(unix)]
impl TreeTerminator for SignalTerminator {
    fn name(&self) -> &'static str {
        "signal"
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        Self::signal_group(pid, nix::sys::signal::Signal::SIGTERM)
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        Self::signal_group(pid, nix::sys::signal::Signal::SIGKILL)
    }
}

/// Uses `taskkill /T` to walk the process tree.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TaskkillTerminator;

#[cfg(windows)]
impl TaskkillTerminator {
    fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let pid = pid.to_string();
        let mut args = vec!["/PID", pid.as_str(), "/T"];
        if force {
            args.push("/F");
        }
        let status = std::process::Command::new("taskkill")
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("taskkill exited with {}", status),
            ))
        }
    }
}

#[cfg(windows)]
impl TreeTerminator for TaskkillTerminator {
    fn name(&self) -> &'static str {
        "taskkill"
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        Self::taskkill(pid, false)
    }

    fn kill(&self, pid: u32) -> io::Result<()> {
        Self::taskkill(pid, true)
    }
}

/// Terminator for the host platform.
pub fn platform_terminator() -> Arc<dyn TreeTerminator> {
    #[cfg(unix)]
    {
        Arc::new(SignalTerminator)
    }
    #[cfg(windows)]
    {
        Arc::new(TaskkillTerminator)
    }
}

/// One external invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Stage name for logs and errors
    pub stage: String,
    pub program: String,
    pub args: Vec<String>,
    /// Expected output duration, used for progress percentages
    pub expected_duration_ms: Option<i64>,
}

impl Invocation {
    pub fn new(stage: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            stage: stage.into(),
            program: program.into(),
            args,
            expected_duration_ms: None,
        }
    }

    pub fn with_expected_duration(mut self, secs: f64) -> Self {
        self.expected_duration_ms = Some((secs * 1000.0) as i64);
        self
    }
}

enum Settled {
    Exited(io::Result<ExitStatus>),
    TimedOut,
}

/// Supervises one process with a wall-clock budget.
pub struct ProcessWatchdog {
    timeout: Duration,
    grace: Duration,
    terminator: Arc<dyn TreeTerminator>,
}

impl ProcessWatchdog {
    /// Create a watchdog with the platform terminator and a 2 second grace window.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            grace: Duration::from_secs(2),
            terminator: platform_terminator(),
        }
    }

    /// Set the window between graceful and forceful termination.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Replace the termination backend.
    pub fn with_terminator(mut self, terminator: Arc<dyn TreeTerminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the invocation to completion or deadline.
    pub async fn run(&self, invocation: &Invocation) -> MediaResult<EncodingResult> {
        let start = Instant::now();
        let stage = invocation.stage.as_str();

        debug!(
            stage,
            "Running: {} {}",
            invocation.program,
            invocation.args.join(" ")
        );

        let mut std_command = std::process::Command::new(&invocation.program);
        std_command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Own process group so a group signal also reaches grandchildren.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_command.process_group(0);
        }

        let mut command = Command::from(std_command);
        command.kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                MediaError::FfmpegNotFound(format!("{}: {}", invocation.program, e))
            } else {
                MediaError::Io(e)
            }
        })?;
        let pid = child.id();

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;
        let reader = spawn_stderr_reader(
            stderr,
            invocation.stage.clone(),
            invocation.expected_duration_ms,
        );

        // Completion is polled first so a simultaneous deadline never overrides it.
        let settled = tokio::select! {
            biased;
            status = child.wait() => Settled::Exited(status),
            _ = tokio::time::sleep(self.timeout) => Settled::TimedOut,
        };

        match settled {
            Settled::Exited(status) => {
                let status = status?;
                let tail = drain_tail(reader).await;
                let elapsed = start.elapsed();

                if status.success() {
                    telemetry::record_encoder_run(stage, "success", elapsed);
                    info!(stage, elapsed_ms = elapsed.as_millis() as u64, "Encoder finished");
                    Ok(EncodingResult {
                        stage: invocation.stage.clone(),
                        success: true,
                        output_path: invocation
                            .args
                            .last()
                            .map(Into::into)
                            .unwrap_or_default(),
                        stderr_tail: tail,
                        elapsed,
                    })
                } else {
                    telemetry::record_encoder_run(stage, "failed", elapsed);
                    warn!(
                        stage,
                        exit_code = ?status.code(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Encoder exited with failure"
                    );
                    Err(MediaError::ffmpeg_failed(
                        format!("{} exited with {}", stage, status),
                        Some(tail.join("\n")),
                        status.code(),
                    ))
                }
            }
            Settled::TimedOut => {
                telemetry::record_encoder_run(stage, "timeout", start.elapsed());
                warn!(
                    stage,
                    timeout_ms = self.timeout.as_millis() as u64,
                    terminator = self.terminator.name(),
                    "Encoder timed out, terminating process tree"
                );
                self.terminate_tree(&mut child, pid, stage).await;
                let tail = drain_tail(reader).await;
                if !tail.is_empty() {
                    debug!(stage, "Last output before timeout:\n{}", tail.join("\n"));
                }
                Err(MediaError::timeout(stage, self.timeout.as_millis() as u64))
            }
        }
    }

    /// Graceful signal, grace window, then forceful kill of the tree and the handle.
    async fn terminate_tree(&self, child: &mut Child, pid: Option<u32>, stage: &str) {
        let Some(pid) = pid else {
            // Handle already reaped; nothing addressable remains.
            let _ = child.kill().await;
            return;
        };

        match self.terminator.terminate(pid) {
            Ok(()) => match tokio::time::timeout(self.grace, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(stage, pid, %status, "Process exited after graceful termination");
                }
                _ => {
                    warn!(
                        stage,
                        pid,
                        grace_ms = self.grace.as_millis() as u64,
                        "Graceful termination had no effect, escalating"
                    );
                }
            },
            Err(e) => {
                warn!(stage, pid, error = %e, "Graceful termination failed, escalating");
            }
        }

        // Sweep the tree even if the leader already exited; stragglers keep the group alive.
        if let Err(e) = self.terminator.kill(pid) {
            debug!(stage, pid, error = %e, "Forceful tree kill returned an error");
        }
        if let Err(e) = child.kill().await {
            debug!(stage, pid, error = %e, "Direct kill returned an error");
        }
    }
}

/// Read stderr, logging progress and keeping a tail of diagnostic lines.
fn spawn_stderr_reader(
    stderr: ChildStderr,
    stage: String,
    expected_duration_ms: Option<i64>,
) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut progress = FfmpegProgress::default();

        while let Ok(Some(line)) = lines.next_line().await {
            if is_progress_line(&line) {
                if let Some(snapshot) = parse_progress_line(&line, &mut progress) {
                    let percent = expected_duration_ms.map(|total| snapshot.percentage(total));
                    debug!(
                        stage = %stage,
                        frame = snapshot.frame,
                        out_time_ms = snapshot.out_time_ms,
                        speed = snapshot.speed,
                        percent = ?percent,
                        "Encoder progress"
                    );
                }
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        tail.into_iter().collect()
    })
}

async fn drain_tail(reader: JoinHandle<Vec<String>>) -> Vec<String> {
    match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, reader).await {
        Ok(Ok(tail)) => tail,
        Ok(Err(_)) => Vec::new(),
        Err(_) => Vec::new(),
    }
}
