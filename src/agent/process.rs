//! Agent runtime process management
//!
//! Spawns the runtime as a child process with piped stdio and turns its
//! stdin/stdout into line channels:
//! - Queued lines are written to stdin, newline-terminated
//! - Non-empty stdout lines are forwarded to a receiver
//! - Stderr is logged
//! - Exit status is recorded when the child finishes
//!
//! The child runs in its own process group so a terminal Ctrl-C reaches only
//! us, and it is killed when the handle is dropped.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::protocol::truncate_for_log;

/// Capacity of the stdin and stdout line channels
const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Errors that can occur during process operations
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process stdio unavailable: {0}")]
    StdioUnavailable(&'static str),

    #[error("Failed to kill process: {0}")]
    KillFailed(#[source] std::io::Error),

    #[error("Process already exited")]
    ProcessExited,
}

/// Result type for process operations
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Event recorded when a process exits
#[derive(Debug, Clone)]
pub struct ProcessExit {
    /// The process ID
    pub id: Uuid,
    /// Exit code if available
    pub exit_code: Option<i32>,
    /// Exit reason
    pub reason: ExitReason,
}

/// Reason for process exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Process exited normally
    Normal,
    /// Process was killed by signal
    Signal,
    /// Process was killed by request
    Killed,
    /// Unknown exit reason
    Unknown,
}

/// Handle to a running runtime process
pub struct AgentProcess {
    /// Unique identifier
    id: Uuid,
    /// The child, shared with the exit watcher
    child: Arc<Mutex<Child>>,
    /// Sender for stdin lines; taken on close
    stdin_tx: Option<mpsc::Sender<String>>,
    /// Receiver for stdout lines; taken by the client
    stdout_rx: Option<mpsc::Receiver<String>>,
    /// Exit information
    exit_info: Arc<RwLock<Option<ProcessExit>>>,
    /// Channel for signaling shutdown to the exit watcher
    shutdown_tx: broadcast::Sender<()>,
}

impl AgentProcess {
    /// Spawn a new process
    ///
    /// # Arguments
    /// * `command` - The command to run
    /// * `args` - Command arguments
    /// * `working_dir` - Working directory for the process
    /// * `env` - Extra environment variables (optional)
    pub fn spawn(
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: Option<&HashMap<String, String>>,
    ) -> ProcessResult<Self> {
        let id = Uuid::new_v4();

        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(env_vars) = env {
            cmd.envs(env_vars);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            command: command.to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(ProcessError::StdioUnavailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(ProcessError::StdioUnavailable("stdout"))?;
        let stderr = child.stderr.take();

        debug!(process = %id, pid = ?child.id(), "Spawned {}", command);

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
        let (stdout_tx, stdout_rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);

        // Writer: closing the channel closes stdin
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = stdin_rx.recv().await {
                trace!(process = %id, "--> {}", truncate_for_log(&line));
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    warn!(process = %id, "Failed to write to agent stdin");
                    break;
                }
            }
        });

        // Reader
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        trace!(process = %id, "<-- {}", truncate_for_log(&line));
                        if stdout_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(process = %id, "Failed to read agent stdout: {}", e);
                        break;
                    }
                }
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = %id, "stderr: {}", line);
                }
            });
        }

        let child = Arc::new(Mutex::new(child));
        let exit_info = Arc::new(RwLock::new(None));
        let (shutdown_tx, _) = broadcast::channel(1);
        Self::start_exit_watcher(
            id,
            Arc::clone(&child),
            Arc::clone(&exit_info),
            shutdown_tx.subscribe(),
        );

        Ok(Self {
            id,
            child,
            stdin_tx: Some(stdin_tx),
            stdout_rx: Some(stdout_rx),
            exit_info,
            shutdown_tx,
        })
    }

    /// Poll the child until it exits and record why
    ///
    /// On shutdown the child is killed and reaped.
    fn start_exit_watcher(
        id: Uuid,
        child: Arc<Mutex<Child>>,
        exit_info: Arc<RwLock<Option<ProcessExit>>>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        tokio::spawn(async move {
            loop {
                let status = {
                    let mut guard = child.lock().await;
                    guard.try_wait()
                };

                match status {
                    Ok(Some(status)) => {
                        let reason = if status.code().is_some() {
                            ExitReason::Normal
                        } else {
                            ExitReason::Signal
                        };
                        debug!(process = %id, code = ?status.code(), "Agent process exited");
                        let mut info = exit_info.write().await;
                        // A kill request already recorded the reason
                        if info.is_none() {
                            *info = Some(ProcessExit {
                                id,
                                exit_code: status.code(),
                                reason,
                            });
                        }
                        break;
                    }
                    Ok(None) => {
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                            _ = shutdown_rx.recv() => {
                                debug!(process = %id, "Handle dropped, killing agent process");
                                let mut guard = child.lock().await;
                                let _ = guard.start_kill();
                                let _ = guard.wait().await;
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(process = %id, "Failed to poll agent process: {}", e);
                        let mut info = exit_info.write().await;
                        if info.is_none() {
                            *info = Some(ProcessExit {
                                id,
                                exit_code: None,
                                reason: ExitReason::Unknown,
                            });
                        }
                        break;
                    }
                }
            }
        });
    }

    /// Get the process ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sender for stdin lines
    pub fn stdin(&self) -> ProcessResult<mpsc::Sender<String>> {
        self.stdin_tx.clone().ok_or(ProcessError::ProcessExited)
    }

    /// Take the stdout line receiver (only once)
    pub fn take_stdout(&mut self) -> Option<mpsc::Receiver<String>> {
        self.stdout_rx.take()
    }

    /// Write one line to stdin
    #[cfg(test)]
    pub async fn write_line(&self, line: impl Into<String>) -> ProcessResult<()> {
        let tx = self.stdin()?;
        tx.send(line.into())
            .await
            .map_err(|_| ProcessError::ProcessExited)
    }

    /// Close our stdin sender; the runtime sees EOF once all clones drop
    pub fn close_stdin(&mut self) {
        self.stdin_tx = None;
    }

    /// Check if the process has exited
    pub async fn has_exited(&self) -> bool {
        self.exit_info.read().await.is_some()
    }

    /// Get exit information if process has exited
    pub async fn exit_info(&self) -> Option<ProcessExit> {
        self.exit_info.read().await.clone()
    }

    /// Wait up to `timeout` for the process to exit on its own
    pub async fn wait_for_exit(&self, timeout: Duration) -> Option<ProcessExit> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(info) = self.exit_info().await {
                return Some(info);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Kill the process
    pub async fn kill(&self) -> ProcessResult<()> {
        if self.has_exited().await {
            return Ok(());
        }

        *self.exit_info.write().await = Some(ProcessExit {
            id: self.id,
            exit_code: None,
            reason: ExitReason::Killed,
        });

        let mut child = self.child.lock().await;
        child.start_kill().map_err(ProcessError::KillFailed)?;
        Ok(())
    }
}

impl Drop for AgentProcess {
    fn drop(&mut self) {
        // The watcher may hold the lock; it kills on shutdown instead
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.start_kill();
        }
        let _ = self.shutdown_tx.send(());
    }
}
