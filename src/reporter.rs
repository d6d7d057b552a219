//! Session status reporter.
//!
//! Single owner of the active session record. Every status transition the
//! launcher performs goes through [`SessionStatusReporter`], which holds the
//! record's write lock for the duration of the control-plane call so that
//! transitions reach the control plane in the order they were issued and
//! can never move backwards.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api::ControlPlane;
use crate::models::session::{Session, SessionStatus};
use crate::{AppError, Result};

/// Serializes status transitions for the one session of this instance.
pub struct SessionStatusReporter {
    control_plane: Arc<dyn ControlPlane>,
    session: RwLock<Option<Session>>,
}

impl SessionStatusReporter {
    /// Create a reporter with no session assigned yet.
    #[must_use]
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            session: RwLock::new(None),
        }
    }

    /// Shared control-plane handle.
    #[must_use]
    pub fn control_plane(&self) -> &Arc<dyn ControlPlane> {
        &self.control_plane
    }

    /// Take ownership of the session handed out by the control plane.
    ///
    /// The local lifecycle restarts at `free`; only transitions reported
    /// through this reporter advance it.
    pub async fn assign(&self, mut session: Session) {
        session.status = SessionStatus::Free;
        info!(
            session_id = ?session.id,
            app_id = ?session.app_id,
            world_id = ?session.world_id,
            "session assigned"
        );
        *self.session.write().await = Some(session);
    }

    /// Last status this launcher reported, `free` before any assignment.
    pub async fn local_status(&self) -> SessionStatus {
        self.session
            .read()
            .await
            .as_ref()
            .map_or(SessionStatus::Free, |s| s.status)
    }

    /// Fetch the live status of the assigned session from the control plane.
    ///
    /// Returns `Ok(None)` when no session has been assigned yet.
    ///
    /// # Errors
    ///
    /// Propagates control-plane failures.
    pub async fn live_status(&self) -> Result<Option<SessionStatus>> {
        let session_id = self.session.read().await.as_ref().and_then(|s| s.id);
        let Some(session_id) = session_id else {
            return Ok(None);
        };
        let live = self.control_plane.session(session_id).await?;
        Ok(Some(live.status))
    }

    /// Report `starting`.
    ///
    /// # Errors
    ///
    /// Propagates control-plane failures and rejected transitions.
    pub async fn report_starting(&self) -> Result<()> {
        self.transition(SessionStatus::Starting).await
    }

    /// Report `running`.
    ///
    /// # Errors
    ///
    /// Propagates control-plane failures and rejected transitions.
    pub async fn report_running(&self) -> Result<()> {
        self.transition(SessionStatus::Running).await
    }

    /// Report `closed`, best effort.
    ///
    /// Failures are logged and swallowed. Returns whether the session is
    /// known to be closed afterwards.
    pub async fn report_closed(&self) -> bool {
        match self.transition(SessionStatus::Closed).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "failed to close session");
                false
            }
        }
    }

    /// Move the session to `next`.
    ///
    /// A repeated `closed` is a no-op. Any other transition that does not
    /// move forward is rejected without contacting the control plane.
    ///
    /// # Errors
    ///
    /// Returns `AppError::State` when no session is assigned or the
    /// transition is not monotonic, and propagates control-plane failures.
    pub async fn transition(&self, next: SessionStatus) -> Result<()> {
        let mut guard = self.session.write().await;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::State(format!("no session assigned, cannot report {next}")))?;

        if session.status == SessionStatus::Closed && next == SessionStatus::Closed {
            return Ok(());
        }

        if !session.status.can_transition_to(next) {
            return Err(AppError::State(format!(
                "cannot move session from {} to {next}",
                session.status
            )));
        }

        let session_id = session
            .id
            .ok_or_else(|| AppError::State("assigned session has no id".into()))?;

        self.control_plane
            .set_session_status(session_id, session.app_id, next)
            .await?;

        let previous = session.status;
        session.status = next;
        info!(%session_id, from = %previous, to = %next, "session status reported");
        Ok(())
    }

    /// Report this instance as `status`, best effort.
    pub async fn report_instance(&self, instance_id: &str, status: SessionStatus) {
        if instance_id.is_empty() {
            warn!("INSTANCE_ID is not set; skipping instance status report");
            return;
        }
        match self
            .control_plane
            .set_instance_status(instance_id, status)
            .await
        {
            Ok(()) => info!(instance_id, %status, "instance status reported"),
            Err(err) => warn!(instance_id, %status, %err, "failed to report instance status"),
        }
    }
}
