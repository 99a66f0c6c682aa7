// Sandboxed one-shot code execution

use crate::executor::config::ExecutorConfig;
use crate::executor::error::{ExecutorError, Result};
use crate::executor::types::{ExecutionRequest, ExecutionResult, FailureKind, Language};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const READ_CHUNK_BYTES: usize = 8192;

const DISABLED_MESSAGE: &str = "Code execution is disabled for security reasons. \
Set ENABLE_CODE_EXECUTOR=true to enable (trusted environments only).";

/// Which pipe a capture belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Bytes captured from one pipe, bounded by the output cap
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    overflowed: bool,
}

/// A running pipe reader and the buffer it fills.
///
/// The buffer outlives the task so an aborted reader still yields its bytes.
struct Capture {
    task: JoinHandle<()>,
    buffer: Arc<Mutex<Captured>>,
}

/// Whichever event resolves first; the others are dropped
#[derive(Debug)]
enum Outcome {
    Exited(ExitStatus),
    TimedOut,
    OutputLimit(Pipe),
}

/// Runs untrusted snippets in short-lived child processes.
///
/// Every call gets its own uniquely named script file and its own process,
/// so concurrent calls share nothing but the working directory.
pub struct SandboxExecutor {
    config: ExecutorConfig,
}

impl SandboxExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        debug!(
            enabled = config.enabled,
            timeout_secs = config.constraints.timeout_secs,
            max_output_bytes = config.constraints.max_output_bytes,
            working_dir = %config.constraints.working_dir.display(),
            "initializing sandbox executor"
        );
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Execute `source_code` with the named interpreter.
    ///
    /// Never fails: every failure mode is encoded in the returned result.
    pub async fn execute(&self, language: &str, source_code: &str) -> ExecutionResult {
        if !self.config.enabled {
            debug!(language = %language, "code execution requested while disabled");
            return ExecutionResult::failed(FailureKind::Disabled, DISABLED_MESSAGE);
        }

        let language = match language.parse::<Language>() {
            Ok(language) => language,
            Err(other) => {
                debug!(language = %other, "rejecting unsupported language");
                return ExecutionResult::failed(
                    FailureKind::UnsupportedLanguage,
                    format!(
                        "Unsupported language: {}. Supported languages: {}",
                        other,
                        Language::supported()
                    ),
                );
            }
        };

        self.run(&ExecutionRequest {
            language,
            source_code: source_code.to_string(),
        })
        .await
    }

    /// Execute an already validated request
    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        if !self.config.enabled {
            return ExecutionResult::failed(FailureKind::Disabled, DISABLED_MESSAGE);
        }

        let start = Instant::now();
        let script = self.script_path(request.language);

        let mut result = match self.run_script(request, &script).await {
            Ok(result) => result,
            Err(e) => {
                warn!(language = %request.language, error = %e, "sandbox execution failed");
                ExecutionResult::failed(FailureKind::SpawnError, e.to_string())
            }
        };

        remove_script(&script).await;

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            language = %request.language,
            duration_ms = result.duration_ms,
            exit_code = ?result.exit_code,
            output_bytes = result.output.len(),
            success = result.success,
            failure = ?result.failure,
            "sandbox execution finished"
        );
        result
    }

    /// Unique script location for one invocation
    fn script_path(&self, language: Language) -> PathBuf {
        self.config
            .constraints
            .working_dir
            .join(format!("{}.{}", Uuid::new_v4(), language.extension()))
    }

    async fn run_script(&self, request: &ExecutionRequest, script: &Path) -> Result<ExecutionResult> {
        let constraints = &self.config.constraints;
        let language = request.language;

        tokio::fs::create_dir_all(&constraints.working_dir)
            .await
            .map_err(|e| ExecutorError::PrepareFailed(e.to_string()))?;
        tokio::fs::write(script, &request.source_code)
            .await
            .map_err(|e| ExecutorError::PrepareFailed(e.to_string()))?;

        // The child runs with cwd = working_dir, so hand it absolute paths
        let working_dir = tokio::fs::canonicalize(&constraints.working_dir)
            .await
            .map_err(|e| ExecutorError::PrepareFailed(e.to_string()))?;
        let script = working_dir.join(
            script
                .file_name()
                .ok_or_else(|| ExecutorError::PrepareFailed("script has no file name".into()))?,
        );

        let mut command = Command::new(language.interpreter());
        command
            .arg(&script)
            .current_dir(&working_dir)
            .env_clear()
            .env("HOME", &working_dir)
            .env("USER", "nobody")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so descendants die with the interpreter
        #[cfg(unix)]
        command.process_group(0);
        if let Some(path) = &self.config.search_path {
            command.env("PATH", path);
        }

        debug!(interpreter = language.interpreter(), script = %script.display(), "spawning sandbox process");

        let mut child = command.spawn().map_err(|e| {
            ExecutorError::SpawnFailed(language.interpreter().to_string(), e.to_string())
        })?;
        let group = child.id();

        let cap = constraints.max_output_bytes;
        let (limit_tx, mut limit_rx) = mpsc::channel::<Pipe>(2);
        let stdout = child
            .stdout
            .take()
            .map(|r| spawn_capture(r, Pipe::Stdout, cap, limit_tx.clone()));
        let stderr = child
            .stderr
            .take()
            .map(|r| spawn_capture(r, Pipe::Stderr, cap, limit_tx.clone()));
        drop(limit_tx);

        let deadline = Duration::from_secs(constraints.timeout_secs);
        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(
                status.map_err(|e| ExecutorError::WaitFailed(language.interpreter().to_string(), e.to_string()))?
            ),
            _ = tokio::time::sleep(deadline) => Outcome::TimedOut,
            Some(pipe) = limit_rx.recv() => Outcome::OutputLimit(pipe),
        };

        let status = match outcome {
            Outcome::Exited(status) => Some(status),
            Outcome::TimedOut => {
                warn!(language = %language, timeout_secs = constraints.timeout_secs, "sandbox process timed out");
                terminate(&mut child, group).await
            }
            Outcome::OutputLimit(pipe) => {
                warn!(language = %language, pipe = ?pipe, max_output_bytes = cap, "sandbox output limit exceeded");
                terminate(&mut child, group).await
            }
        };

        // Background jobs left by a clean exit still hold the pipes
        kill_group(group);

        let grace = Duration::from_millis(constraints.drain_grace_ms);
        let stdout = collect(stdout, grace).await;
        let stderr = collect(stderr, grace).await;

        Ok(build_result(
            &outcome,
            status,
            stdout,
            stderr,
            constraints.timeout_secs,
            cap,
        ))
    }
}

/// Kill the child with its whole group and reap it; SIGKILL cannot be masked
async fn terminate(child: &mut Child, group: Option<u32>) -> Option<ExitStatus> {
    kill_group(group);
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "kill failed, process probably already exited");
    }
    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!(error = %e, "failed to reap sandbox process");
            None
        }
    }
}

/// SIGKILL every process in the sandbox's group.
///
/// The group id is the interpreter's pid; it stays reserved while any
/// member is alive, so a stale id only ever hits an empty group.
#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid = pgid, "killed sandbox process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid = pgid, error = %e, "failed to kill sandbox process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

fn spawn_capture<R>(mut reader: R, pipe: Pipe, cap: usize, limit: mpsc::Sender<Pipe>) -> Capture
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = Arc::new(Mutex::new(Captured::default()));
    let shared = buffer.clone();

    let task = tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut captured = shared.lock().unwrap_or_else(|e| e.into_inner());
                    let room = cap.saturating_sub(captured.bytes.len());
                    if n > room {
                        captured.bytes.extend_from_slice(&buf[..room]);
                        captured.overflowed = true;
                        let _ = limit.try_send(pipe);
                        break;
                    }
                    captured.bytes.extend_from_slice(&buf[..n]);
                }
                Err(e) => {
                    debug!(pipe = ?pipe, error = %e, "pipe read failed");
                    break;
                }
            }
        }
    });

    Capture { task, buffer }
}

/// Wait for a pipe reader, giving up after `grace`; bytes read so far are kept
async fn collect(capture: Option<Capture>, grace: Duration) -> Captured {
    let Some(Capture { mut task, buffer }) = capture else {
        return Captured::default();
    };
    match tokio::time::timeout(grace, &mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "pipe reader task failed"),
        Err(_) => {
            // Something outside the group still holds the pipe open
            debug!("pipe reader did not drain in time, aborting");
            task.abort();
        }
    }
    let mut captured = buffer.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::take(&mut *captured)
}

fn build_result(
    outcome: &Outcome,
    status: Option<ExitStatus>,
    stdout: Captured,
    stderr: Captured,
    timeout_secs: u64,
    cap: usize,
) -> ExecutionResult {
    let output = truncate_utf8(String::from_utf8_lossy(&stdout.bytes).into_owned(), cap);
    let stderr_text = truncate_utf8(String::from_utf8_lossy(&stderr.bytes).into_owned(), cap);
    let exit_code = status.and_then(|s| s.code());
    let overflowed =
        stdout.overflowed || stderr.overflowed || matches!(outcome, Outcome::OutputLimit(_));

    if matches!(outcome, Outcome::TimedOut) {
        let mut error = format!("Execution timeout ({} seconds)", timeout_secs);
        if !stderr_text.is_empty() {
            error.push('\n');
            error.push_str(&stderr_text);
        }
        return ExecutionResult {
            success: false,
            output,
            error,
            exit_code: None,
            failure: Some(FailureKind::Timeout),
            duration_ms: 0,
        };
    }

    if overflowed {
        let mut error = stderr_text;
        if !error.is_empty() {
            error.push('\n');
        }
        error.push_str(&format!("Output size limit exceeded ({} bytes)", cap));
        return ExecutionResult {
            success: false,
            output,
            error,
            exit_code,
            failure: Some(FailureKind::OutputLimitExceeded),
            duration_ms: 0,
        };
    }

    let success = exit_code == Some(0);
    let error = if stderr_text.is_empty() && !success {
        match exit_code {
            Some(code) => format!("Process exited with code {}", code),
            None => "Process terminated by signal".to_string(),
        }
    } else {
        stderr_text
    };

    ExecutionResult {
        success,
        output,
        error,
        exit_code,
        failure: (!success).then_some(FailureKind::NonzeroExit),
        duration_ms: 0,
    }
}

/// Best-effort removal; failures never reach the caller
async fn remove_script(script: &Path) {
    match tokio::fs::remove_file(script).await {
        Ok(()) => debug!(path = %script.display(), "removed sandbox file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %script.display(), error = %e, "failed to remove sandbox file"),
    }
}

/// Cut `s` to at most `max` bytes without splitting a character
fn truncate_utf8(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_respects_boundaries() {
        assert_eq!(truncate_utf8("hello".to_string(), 10), "hello");
        assert_eq!(truncate_utf8("hello".to_string(), 3), "hel");
        // 'é' is two bytes; cutting inside it backs off
        assert_eq!(truncate_utf8("aé".to_string(), 2), "a");
    }

    #[tokio::test]
    async fn test_disabled_short_circuits() {
        let dir = std::env::temp_dir().join(format!("chathub-disabled-{}", Uuid::new_v4()));
        let mut config = ExecutorConfig::default();
        config.constraints.working_dir = dir.clone();
        let sandbox = SandboxExecutor::new(config);

        let result = sandbox.execute("bash", "echo hi").await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Disabled));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_unsupported_language_spawns_nothing() {
        let dir = std::env::temp_dir().join(format!("chathub-unsupported-{}", Uuid::new_v4()));
        let sandbox = SandboxExecutor::new(ExecutorConfig::enabled_in(&dir));

        let result = sandbox.execute("cobol", "DISPLAY 'HI'").await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::UnsupportedLanguage));
        assert!(result.error.contains("cobol"));
        assert!(!dir.exists());
    }
}
