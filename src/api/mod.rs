//! Control-plane API abstraction.
//!
//! The [`ControlPlane`] trait decouples the orchestrator, the status
//! reporter, and the health monitor from the HTTP transport. The
//! production implementation is [`http::HttpControlPlane`].

pub mod http;

use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::models::release::Release;
use crate::models::session::{Session, SessionStatus};
use crate::Result;

/// Boxed future returned by [`ControlPlane`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Operations the launcher performs against the control plane.
///
/// Calls are issued in the order the caller awaits them; implementations
/// must not batch or reorder requests.
pub trait ControlPlane: Send + Sync {
    /// Fetch the session pending for this instance, if any.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`](crate::AppError::Http) on transport failure
    /// or [`AppError::Api`](crate::AppError::Api) on an error envelope.
    fn pending_session(&self) -> ApiFuture<'_, Option<Session>>;

    /// Fetch the live record of a session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`](crate::AppError::Http) on transport failure
    /// or [`AppError::Api`](crate::AppError::Api) on an error envelope.
    fn session(&self, session_id: Uuid) -> ApiFuture<'_, Session>;

    /// Request a session status transition.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`](crate::AppError::Http) on transport failure
    /// or [`AppError::Api`](crate::AppError::Api) on an error envelope.
    fn set_session_status(
        &self,
        session_id: Uuid,
        app_id: Option<Uuid>,
        status: SessionStatus,
    ) -> ApiFuture<'_, ()>;

    /// Report the status of this instance.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`](crate::AppError::Http) on transport failure
    /// or [`AppError::Api`](crate::AppError::Api) on an error envelope.
    fn set_instance_status<'a>(
        &'a self,
        instance_id: &'a str,
        status: SessionStatus,
    ) -> ApiFuture<'a, ()>;

    /// Fetch the releases published for `app_id` on `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Http`](crate::AppError::Http) on transport failure
    /// or [`AppError::Api`](crate::AppError::Api) on an error envelope.
    fn app_releases<'a>(&'a self, app_id: Uuid, platform: &'a str) -> ApiFuture<'a, Vec<Release>>;
}
