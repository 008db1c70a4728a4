use async_trait::async_trait;
use log::debug;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// What to do with the external process's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Capture stdout/stderr and return them in the result
    Captured,
    /// Let the process own the caller's terminal; nothing is captured
    Inherited,
}

/// Failure classification for one invocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    None,
    /// Rejected before any process was spawned
    Validation,
    NotFound,
    NonzeroExit,
    Timeout,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::None => "none",
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NonzeroExit => "nonzero_exit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unexpected => "unexpected",
        };
        write!(f, "{label}")
    }
}

/// Outcome of one invocation attempt. Created once, never mutated.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub error_kind: ErrorKind,
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn completed(output: String, exit_code: Option<i32>) -> Self {
        ExecutionResult {
            success: true,
            output,
            error_kind: ErrorKind::None,
            exit_code,
        }
    }

    pub fn failure(error_kind: ErrorKind, output: String, exit_code: Option<i32>) -> Self {
        ExecutionResult {
            success: false,
            output,
            error_kind,
            exit_code,
        }
    }
}

/// A fully described external process run
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_seconds: u64,
    pub output: OutputPolicy,
}

/// Seam between the orchestration code and the operating system. Tests
/// substitute recording or scripted launchers for the real one.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, request: &ExecRequest) -> ExecutionResult;
}

/// The real launcher: spawns the process via tokio, enforces the timeout,
/// and classifies every failure into an `ErrorKind`.
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn launch(&self, request: &ExecRequest) -> ExecutionResult {
        debug!(
            "Launching '{}' with {} args (timeout {}s, {:?})",
            request.program,
            request.args.len(),
            request.timeout_seconds,
            request.output
        );
        match request.output {
            OutputPolicy::Captured => launch_captured(request).await,
            OutputPolicy::Inherited => launch_inherited(request).await,
        }
    }
}

fn base_command(request: &ExecRequest) -> Command {
    let mut command = Command::new(&request.program);
    command.args(&request.args);
    if let Some(dir) = &request.working_dir {
        command.current_dir(dir);
    }
    command
}

fn spawn_failure(request: &ExecRequest, error: &std::io::Error) -> ExecutionResult {
    if error.kind() == std::io::ErrorKind::NotFound {
        ExecutionResult::failure(
            ErrorKind::NotFound,
            format!("executable '{}' was not found", request.program),
            None,
        )
    } else {
        ExecutionResult::failure(
            ErrorKind::Unexpected,
            format!("failed to start '{}': {error}", request.program),
            None,
        )
    }
}

async fn launch_captured(request: &ExecRequest) -> ExecutionResult {
    let mut command = base_command(request);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => return spawn_failure(request, &error),
    };

    // Drain both pipes while waiting so a full pipe buffer cannot stall the
    // child
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let reader = tokio::spawn(async move {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let read_stdout = async {
            if let Some(mut pipe) = stdout_pipe {
                let _ = pipe.read_to_end(&mut stdout).await;
            }
        };
        let read_stderr = async {
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut stderr).await;
            }
        };
        tokio::join!(read_stdout, read_stderr);
        (stdout, stderr)
    });

    let status = match timeout(Duration::from_secs(request.timeout_seconds), child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(error)) => {
            reader.abort();
            return ExecutionResult::failure(
                ErrorKind::Unexpected,
                format!("failed to wait for process: {error}"),
                None,
            );
        }
        Err(_) => {
            terminate(&mut child).await;
            reader.abort();
            return ExecutionResult::failure(ErrorKind::Timeout, String::new(), None);
        }
    };

    let (stdout, stderr) = reader.await.unwrap_or_default();
    let stdout = String::from_utf8_lossy(&stdout).to_string();
    let stderr = String::from_utf8_lossy(&stderr).to_string();

    if status.success() {
        ExecutionResult::completed(stdout, status.code())
    } else {
        // stderr is the diagnostic of record, stdout the fallback
        let diagnostic = if stderr.trim().is_empty() { stdout } else { stderr };
        ExecutionResult::failure(ErrorKind::NonzeroExit, diagnostic, status.code())
    }
}

async fn launch_inherited(request: &ExecRequest) -> ExecutionResult {
    let mut command = base_command(request);
    command
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => return spawn_failure(request, &error),
    };

    let status = match timeout(Duration::from_secs(request.timeout_seconds), child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(error)) => {
            return ExecutionResult::failure(
                ErrorKind::Unexpected,
                format!("failed to wait for process: {error}"),
                None,
            );
        }
        Err(_) => {
            terminate(&mut child).await;
            return ExecutionResult::failure(ErrorKind::Timeout, String::new(), None);
        }
    };

    if status.success() {
        ExecutionResult::completed(
            "Command executed successfully. Output was displayed in console.".to_string(),
            status.code(),
        )
    } else {
        ExecutionResult::failure(ErrorKind::NonzeroExit, String::new(), status.code())
    }
}

const TERMINATE_GRACE_SECONDS: u64 = 2;

/// Stop a child that must not keep running: graceful signal first, forced
/// kill if it lingers. The child is always reaped so no handle remains alive.
#[cfg(unix)]
pub(crate) async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
        if timeout(Duration::from_secs(TERMINATE_GRACE_SECONDS), child.wait())
            .await
            .is_ok()
        {
            return;
        }
    }
    if let Err(error) = child.kill().await {
        debug!("Process already gone before forced kill: {error}");
    }
}

#[cfg(not(unix))]
pub(crate) async fn terminate(child: &mut Child) {
    if let Err(error) = child.kill().await {
        debug!("Process already gone before forced kill: {error}");
    }
}
