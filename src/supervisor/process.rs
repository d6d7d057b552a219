//! Application process launch and exit mapping.
//!
//! The child inherits the launcher's environment and stderr. Its stdout is
//! drained line by line into the `app` tracing target. The child is not
//! killed when its handle is dropped: shutdown of a running application is
//! cooperative through the session status.

use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use crate::config::StreamingConfig;
use crate::{AppError, Result};

/// How the application process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal exit with a status code.
    Exited(i32),
    /// Terminated by a signal (number when the platform reports one).
    Signaled(Option<i32>),
    /// The supervisor lost track of the process.
    Error(String),
}

impl ExitOutcome {
    /// Whether the process exited with status 0.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Map an OS exit status.
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self::Signaled(status.signal())
        }
        #[cfg(not(unix))]
        {
            Self::Signaled(None)
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with status {code}"),
            Self::Signaled(Some(signal)) => write!(f, "terminated by signal {signal}"),
            Self::Signaled(None) => write!(f, "terminated by signal"),
            Self::Error(reason) => write!(f, "supervision failed: {reason}"),
        }
    }
}

/// Streaming transport flags followed by the caller's passthrough arguments.
#[must_use]
pub fn command_line(streaming: &StreamingConfig, passthrough: &[String]) -> Vec<String> {
    let mut args = vec![
        format!("-PixelStreamingIP={}", streaming.ip),
        format!("-PixelStreamingPort={}", streaming.port),
        "-RenderOffScreen".to_owned(),
        "-ForceRes".to_owned(),
        format!("-ResX={}", streaming.res_x),
        format!("-ResY={}", streaming.res_y),
    ];
    args.extend(passthrough.iter().cloned());
    args
}

/// Everything needed to start the application process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Program to execute.
    pub program: PathBuf,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub current_dir: PathBuf,
}

/// Start the process described by `plan` and wait for it to end.
///
/// # Errors
///
/// Returns `AppError::Process` if the process cannot be spawned. Failures
/// while waiting are reported as [`ExitOutcome::Error`].
pub async fn launch(plan: &LaunchPlan) -> Result<ExitOutcome> {
    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args)
        .current_dir(&plan.current_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = cmd.spawn().map_err(|err| {
        AppError::Process(format!(
            "failed to start {}: {err}",
            plan.program.display()
        ))
    })?;

    let pid = child.id().unwrap_or(0);
    info!(
        pid,
        program = %plan.program.display(),
        cwd = %plan.current_dir.display(),
        args = ?plan.args,
        "application process started"
    );

    let drain = child
        .stdout
        .take()
        .map(|stdout| tokio::spawn(drain_stdout(stdout).instrument(info_span!("app_stdout", pid))));

    let outcome = match child.wait().await {
        Ok(status) => ExitOutcome::from_status(status),
        Err(err) => ExitOutcome::Error(format!("failed to wait for process {pid}: {err}")),
    };

    join_drain(drain).await;
    info!(pid, %outcome, "application process ended");
    Ok(outcome)
}

async fn drain_stdout(stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(target: "app", "{line}"),
            Ok(None) => {
                info!("application process has exited");
                break;
            }
            Err(err) => {
                warn!(%err, "failed to read application output");
                break;
            }
        }
    }
}

async fn join_drain(drain: Option<JoinHandle<()>>) {
    if let Some(handle) = drain {
        if let Err(err) = handle.await {
            warn!(%err, "output drain task failed");
        }
    }
}
