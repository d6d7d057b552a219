//! Session orchestration.
//!
//! [`SessionOrchestrator`] drives the one session this instance serves:
//! it polls the control plane until a session is assigned, reports
//! `starting`, resolves and installs the latest release, reports `running`,
//! supervises the application until it exits, and reports `closed`.
//!
//! The shared [`CancellationToken`] is the only asynchronous way out. It is
//! cancelled by the health server's force-close handler and ends the run
//! without signalling a child that is already running.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::LauncherConfig;
use crate::install::download::Downloader;
use crate::install::{ArtifactInstaller, InstallLayout};
use crate::models::session::Session;
use crate::reporter::SessionStatusReporter;
use crate::resolver::ReleaseResolver;
use crate::supervisor::process::ExitOutcome;
use crate::supervisor::AppRunner;
use crate::{AppError, Result};

/// States of the orchestrator, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrchestratorState {
    /// Polling the control plane for a pending session.
    AwaitingSession,
    /// Session assigned and reported `starting`.
    Starting,
    /// Resolving and installing the release.
    Installing,
    /// Application launched and supervised.
    Running,
    /// Session closed; nothing left to do.
    Closed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingSession => "awaiting_session",
            Self::Starting => "starting",
            Self::Installing => "installing",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a completed orchestration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorOutcome {
    /// The application exited with status 0.
    Completed,
    /// The application exited unsuccessfully.
    AppFailed(ExitOutcome),
    /// The run was cancelled by a force-close request.
    ForcedClose,
}

impl OrchestratorOutcome {
    /// Whether the launcher should exit successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::AppFailed(_))
    }
}

/// Next interval between pending-session polls.
///
/// A `factor` of 1.0 or less keeps `current`. Larger factors grow the
/// interval geometrically up to `max`.
#[must_use]
pub fn next_poll_interval(current: Duration, factor: f64, max: Duration) -> Duration {
    if factor <= 1.0 || !factor.is_finite() {
        return current;
    }
    let cap = max.max(current);
    Duration::try_from_secs_f64(current.as_secs_f64() * factor).map_or(cap, |next| next.min(cap))
}

/// Top-level state machine of the launcher.
pub struct SessionOrchestrator {
    reporter: Arc<SessionStatusReporter>,
    resolver: ReleaseResolver,
    installer: ArtifactInstaller,
    runner: Arc<dyn AppRunner>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    poll_backoff_factor: f64,
    poll_max_interval: Duration,
    state: watch::Sender<OrchestratorState>,
}

impl SessionOrchestrator {
    /// Assemble an orchestrator from its collaborators.
    ///
    /// Polling defaults to a fixed 30 second interval.
    #[must_use]
    pub fn new(
        reporter: Arc<SessionStatusReporter>,
        resolver: ReleaseResolver,
        installer: ArtifactInstaller,
        runner: Arc<dyn AppRunner>,
        shutdown: CancellationToken,
    ) -> Self {
        let interval = Duration::from_secs(30);
        let (state, _) = watch::channel(OrchestratorState::AwaitingSession);
        Self {
            reporter,
            resolver,
            installer,
            runner,
            shutdown,
            poll_interval: interval,
            poll_backoff_factor: 1.0,
            poll_max_interval: interval,
            state,
        }
    }

    /// Build the production orchestrator for `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the download client cannot be built.
    pub fn from_config(
        config: &LauncherConfig,
        reporter: Arc<SessionStatusReporter>,
        runner: Arc<dyn AppRunner>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let resolver = ReleaseResolver::new(Arc::clone(reporter.control_plane()), &config.platform);
        let installer = ArtifactInstaller::new(InstallLayout::from_config(config), Downloader::new()?);
        Ok(Self::new(reporter, resolver, installer, runner, shutdown).with_polling(
            config.poll_interval(),
            config.poll_backoff_factor,
            config.poll_max_interval(),
        ))
    }

    /// Override the polling schedule.
    #[must_use]
    pub fn with_polling(mut self, interval: Duration, backoff_factor: f64, max: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_backoff_factor = backoff_factor;
        self.poll_max_interval = max;
        self
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    fn enter(&self, next: OrchestratorState) {
        let previous = self.state.send_replace(next);
        info!(from = %previous, to = %next, "orchestrator state changed");
    }

    /// Serve one session from assignment to closure.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: a failed `starting` or `running`
    /// report, a resolution or installation failure, or an application that
    /// cannot be located or started. The session is reported closed, best
    /// effort, before any error is returned.
    pub async fn run(&self) -> Result<OrchestratorOutcome> {
        self.enter(OrchestratorState::AwaitingSession);
        let session = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                info!("cancelled while awaiting a session");
                self.enter(OrchestratorState::Closed);
                return Ok(OrchestratorOutcome::ForcedClose);
            }
            session = self.await_session() => session,
        };

        self.reporter.assign(session.clone()).await;

        let result = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                info!("force close requested, leaving any running application to exit on its own");
                self.reporter.report_closed().await;
                Ok(OrchestratorOutcome::ForcedClose)
            }
            result = self.serve(&session) => result,
        };

        if let Err(err) = &result {
            error!(%err, "session failed");
            self.reporter.report_closed().await;
        }
        self.enter(OrchestratorState::Closed);
        result
    }

    async fn await_session(&self) -> Session {
        let mut interval = self.poll_interval;
        loop {
            match self.reporter.control_plane().pending_session().await {
                Ok(Some(session)) if session.is_assigned() => {
                    info!(session_id = ?session.id, app_id = ?session.app_id, "pending session found");
                    return session;
                }
                Ok(_) => debug!("no pending session"),
                Err(err) => warn!(%err, "failed to poll for a pending session"),
            }

            tokio::time::sleep(interval).await;
            interval =
                next_poll_interval(interval, self.poll_backoff_factor, self.poll_max_interval);
        }
    }

    async fn serve(&self, session: &Session) -> Result<OrchestratorOutcome> {
        self.enter(OrchestratorState::Starting);
        self.reporter.report_starting().await?;

        self.enter(OrchestratorState::Installing);
        let release = self.resolver.resolve(session.app_id).await?;
        let app_id: Uuid = session
            .app_id
            .ok_or_else(|| AppError::Resolution("app id is not set".into()))?;
        let install_dir = self.installer.install(app_id, &release).await?;

        self.reporter.report_running().await?;
        self.enter(OrchestratorState::Running);

        let outcome = self.runner.run(&install_dir).await?;
        self.reporter.report_closed().await;
        if outcome.is_success() {
            info!(%outcome, "application finished");
            Ok(OrchestratorOutcome::Completed)
        } else {
            error!(%outcome, "application failed");
            Ok(OrchestratorOutcome::AppFailed(outcome))
        }
    }
}
