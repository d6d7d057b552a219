//! Application process supervision.
//!
//! The [`AppRunner`] trait is the seam between the session orchestrator and
//! the operating system: [`ProcessSupervisor`] finds the entrypoint of an
//! installed release, launches it with the streaming transport flags, and
//! resolves once the process has ended.

pub mod entrypoint;
pub mod process;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::{info, info_span, Instrument};

use self::entrypoint::{find_entrypoint, normalize_entrypoint, project_name};
use self::process::{command_line, launch, ExitOutcome, LaunchPlan};
use crate::config::{LauncherConfig, StreamingConfig};
use crate::{AppError, Result};

/// Boxed future returned by [`AppRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<ExitOutcome>> + Send + 'a>>;

/// Runs an installed release to completion.
pub trait AppRunner: Send + Sync {
    /// Launch the application installed in `install_dir` and wait for it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::EntrypointNotFound` if no entrypoint exists and
    /// `AppError::Process` if it cannot be started.
    fn run<'a>(&'a self, install_dir: &'a Path) -> RunFuture<'a>;
}

/// Supervises the application binary of an Unreal-style release tree.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    streaming: StreamingConfig,
    passthrough: Vec<String>,
    binary_suffix: &'static str,
}

impl ProcessSupervisor {
    /// Create a supervisor launching binaries that end with `binary_suffix`.
    #[must_use]
    pub fn new(
        streaming: StreamingConfig,
        passthrough: Vec<String>,
        binary_suffix: &'static str,
    ) -> Self {
        Self {
            streaming,
            passthrough,
            binary_suffix,
        }
    }

    /// Supervisor configured from the launcher settings.
    #[must_use]
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(
            config.streaming.clone(),
            config.passthrough_args.clone(),
            config.binary_suffix(),
        )
    }

    /// Locate the entrypoint below `install_dir` and build its launch plan.
    ///
    /// # Errors
    ///
    /// Returns `AppError::EntrypointNotFound` if no candidate matches.
    pub async fn plan(&self, install_dir: &Path) -> Result<LaunchPlan> {
        let root: PathBuf = install_dir.to_path_buf();
        let suffix = self.binary_suffix;
        let entrypoint = tokio::task::spawn_blocking(move || find_entrypoint(&root, suffix))
            .await
            .map_err(|err| AppError::Process(format!("entrypoint search failed: {err}")))??;

        let normalized = normalize_entrypoint(&entrypoint);
        info!(
            project = project_name(&entrypoint, suffix),
            entrypoint = %normalized.relative.display(),
            project_dir = %normalized.project_dir.display(),
            "entrypoint found"
        );

        Ok(LaunchPlan {
            program: normalized.program(),
            args: command_line(&self.streaming, &self.passthrough),
            current_dir: normalized.project_dir,
        })
    }
}

impl AppRunner for ProcessSupervisor {
    fn run<'a>(&'a self, install_dir: &'a Path) -> RunFuture<'a> {
        let span = info_span!("supervise", install_dir = %install_dir.display());
        Box::pin(
            async move {
                let plan = self.plan(install_dir).await?;
                launch(&plan).await
            }
            .instrument(span),
        )
    }
}
