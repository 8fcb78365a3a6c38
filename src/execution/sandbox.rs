//! The §6.4 sandbox interface and §4.7's run-phase critical-error monitor.
//!
//! `LocalSandbox` runs the build/run commands in-place via
//! [`tokio::process::Command`] rather than inside an isolated container —
//! full sandbox packaging is an external concern (§1 Non-goals); this crate
//! only needs something that satisfies the `create/upload/run/close`
//! contract. The run-phase monitor borrows the debounce loop's shape: an
//! mpsc channel fed by a log-producing task, drained with a bounded
//! `tokio::time::timeout` per sample.

use crate::error::SandboxErrorType;
use async_trait::async_trait;
use regex::RegexSet;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// §5: sandbox build default timeout.
pub const BUILD_TIMEOUT: Duration = Duration::from_secs(600);
/// §4.7: run-phase monitor sampling interval.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);
/// §4.7: run-phase monitor max wait before giving up and declaring success.
const RUN_MONITOR_MAX_WAIT: Duration = Duration::from_secs(60);

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug)]
pub struct SandboxIoError(pub String);

impl std::fmt::Display for SandboxIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SandboxIoError {}

/// One sandbox session: created once per P5 verification attempt, torn down
/// with `close()` regardless of outcome.
#[async_trait]
pub trait SandboxSession: Send + Sync {
    async fn upload(&self, local_path: &Path) -> Result<(), SandboxIoError>;
    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput, SandboxIoError>;
    /// Start a long-running command, streaming its combined stdout/stderr
    /// line by line until the process exits or `close()` tears it down.
    async fn start_streaming(&self, command: &str) -> Result<mpsc::Receiver<String>, SandboxIoError>;
    async fn close(&self);
}

#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxIoError>;
}

/// Runs build/run commands as plain child processes rooted at the uploaded
/// path, with no container isolation (§1 Non-goals: full sandbox packaging
/// is out of scope for the core).
pub struct LocalSandbox;

pub struct LocalSandboxSession {
    root: std::sync::Mutex<Option<std::path::PathBuf>>,
}

#[async_trait]
impl SandboxRuntime for LocalSandbox {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxIoError> {
        Ok(Box::new(LocalSandboxSession {
            root: std::sync::Mutex::new(None),
        }))
    }
}

#[async_trait]
impl SandboxSession for LocalSandboxSession {
    async fn upload(&self, local_path: &Path) -> Result<(), SandboxIoError> {
        *self.root.lock().unwrap() = Some(local_path.to_path_buf());
        Ok(())
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandOutput, SandboxIoError> {
        let root = self.root.lock().unwrap().clone();
        let mut cmd = shell_command(command, root.as_deref());

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| SandboxIoError(format!("command `{command}` timed out after {timeout:?}")))?
            .map_err(|e| SandboxIoError(format!("command `{command}` failed to launch: {e}")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn start_streaming(&self, command: &str) -> Result<mpsc::Receiver<String>, SandboxIoError> {
        let root = self.root.lock().unwrap().clone();
        let mut cmd = shell_command(command, root.as_deref());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| SandboxIoError(format!("command `{command}` failed to launch: {e}")))?;
        let stdout = child.stdout.take().expect("piped stdout");

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            let _ = child.wait().await;
        });

        Ok(rx)
    }

    async fn close(&self) {
        *self.root.lock().unwrap() = None;
    }
}

fn shell_command(command: &str, cwd: Option<&Path>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// A deterministic double for tests: `run()` always reports a successful
/// build; `start_streaming()` emits a single fixed line of log output.
pub struct MockSandbox {
    run_output: String,
}

impl MockSandbox {
    pub fn with_run_output(line: impl Into<String>) -> Self {
        Self { run_output: line.into() }
    }
}

struct MockSandboxSession {
    run_output: String,
}

#[async_trait]
impl SandboxRuntime for MockSandbox {
    async fn create(&self) -> Result<Box<dyn SandboxSession>, SandboxIoError> {
        Ok(Box::new(MockSandboxSession {
            run_output: self.run_output.clone(),
        }))
    }
}

#[async_trait]
impl SandboxSession for MockSandboxSession {
    async fn upload(&self, _local_path: &Path) -> Result<(), SandboxIoError> {
        Ok(())
    }

    async fn run(&self, _command: &str, _timeout: Duration) -> Result<CommandOutput, SandboxIoError> {
        Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn start_streaming(&self, _command: &str) -> Result<mpsc::Receiver<String>, SandboxIoError> {
        let (tx, rx) = mpsc::channel(4);
        let line = self.run_output.clone();
        tokio::spawn(async move {
            let _ = tx.send(line).await;
        });
        Ok(rx)
    }

    async fn close(&self) {}
}

/// §4.7 critical-error patterns, case-insensitive.
fn critical_error_patterns() -> &'static RegexSet {
    static SET: OnceLock<RegexSet> = OnceLock::new();
    SET.get_or_init(|| {
        RegexSet::new([
            r"(?i)application failed to start",
            r"(?i)port .* already in use",
            r"(?i)fatal error",
            r"(?i)outofmemoryerror",
            r"(?i)classnotfoundexception",
            r"(?i)no main class found",
        ])
        .expect("static regex set")
    })
}

fn classify(line: &str) -> SandboxErrorType {
    let lower = line.to_lowercase();
    if lower.contains("classnotfoundexception") || lower.contains("no main class found") {
        SandboxErrorType::Dependency
    } else if lower.contains("port") && lower.contains("already in use") {
        SandboxErrorType::Network
    } else if lower.contains("outofmemoryerror") {
        SandboxErrorType::Runtime
    } else if lower.contains("application failed to start") {
        SandboxErrorType::Configuration
    } else {
        SandboxErrorType::Unknown
    }
}

pub struct CriticalError {
    pub error_type: SandboxErrorType,
    pub line: String,
}

/// §4.7 run-phase monitor: sample the streaming log every
/// [`SAMPLE_INTERVAL`] up to [`RUN_MONITOR_MAX_WAIT`], checking each sample
/// against the critical-error pattern set. Returns `Ok(())` if the wait
/// elapses with no match (the process is presumed to have started cleanly);
/// returns the first match immediately, short-circuiting further sampling.
pub async fn monitor_run(session: &dyn SandboxSession, run_command: &str) -> Result<(), CriticalError> {
    let mut rx = match session.start_streaming(run_command).await {
        Ok(rx) => rx,
        Err(_) => return Ok(()),
    };

    let deadline = tokio::time::Instant::now() + RUN_MONITOR_MAX_WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        let wait = SAMPLE_INTERVAL.min(remaining);

        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(line)) => {
                if critical_error_patterns().is_match(&line) {
                    return Err(CriticalError {
                        error_type: classify(&line),
                        line,
                    });
                }
            }
            Ok(None) => return Ok(()),
            Err(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn monitor_detects_critical_error() {
        let sandbox = MockSandbox::with_run_output("Port 8080 already in use");
        let session = block_on(sandbox.create()).unwrap();
        let result = block_on(monitor_run(session.as_ref(), "run"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().error_type, SandboxErrorType::Network);
    }

    #[test]
    fn monitor_passes_on_clean_log() {
        let sandbox = MockSandbox::with_run_output("Started application on port 8080");
        let session = block_on(sandbox.create()).unwrap();
        let result = block_on(monitor_run(session.as_ref(), "run"));
        assert!(result.is_ok());
    }
}
