//! Local supervision HTTP surface.
//!
//! The hosting control plane polls `GET /healthcheck?totalCheck=<n>` to
//! observe the session and calls `GET /hello` to force it closed. Handlers
//! never touch session state directly; every transition goes through the
//! shared [`SessionStatusReporter`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::session::SessionStatus;
use crate::reporter::SessionStatusReporter;
use crate::{AppError, Result};

/// Shared state of the health handlers.
#[derive(Clone)]
pub struct HealthState {
    /// Owner of the session record.
    pub reporter: Arc<SessionStatusReporter>,
    /// Check count at which a running session is force-closed.
    pub close_threshold: u32,
    /// Cancelled by `/hello` to stop the launcher.
    pub shutdown: CancellationToken,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    session_status: SessionStatus,
}

fn status_response(status: SessionStatus) -> Response {
    (
        StatusCode::OK,
        Json(StatusBody {
            session_status: status,
        }),
    )
        .into_response()
}

/// Parse the caller's running check count.
///
/// Counts too large for `u64` saturate; anything else unusable counts as 0.
fn check_count(params: &HashMap<String, String>) -> u64 {
    let Some(raw) = params.get("totalCheck") else {
        warn!("healthcheck without totalCheck");
        return 0;
    };
    let trimmed = raw.trim();
    match trimmed.parse::<u64>() {
        Ok(count) => count,
        Err(_) if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) => u64::MAX,
        Err(err) => {
            warn!(total_check = raw.as_str(), %err, "invalid totalCheck");
            0
        }
    }
}

async fn healthcheck(
    State(state): State<HealthState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let total_check = check_count(&params);

    let live = match state.reporter.live_status().await {
        Ok(Some(status)) => status,
        Ok(None) => return status_response(SessionStatus::Free),
        Err(err) => {
            error!(%err, "failed to fetch session status");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if live == SessionStatus::Running && total_check >= u64::from(state.close_threshold) {
        info!(total_check, "health threshold reached, closing session");
        if let Err(err) = state.reporter.transition(SessionStatus::Closed).await {
            error!(%err, "failed to close session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        return status_response(SessionStatus::Closed);
    }

    status_response(live)
}

async fn hello(State(state): State<HealthState>) -> StatusCode {
    info!("close requested");
    state.reporter.report_closed().await;
    state.shutdown.cancel();
    StatusCode::OK
}

/// Build the health router.
#[must_use]
pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/hello", get(hello))
        .with_state(state)
}

/// Bind the health listener on all interfaces at `port`.
///
/// # Errors
///
/// Returns `AppError::Config` if the port cannot be bound.
pub async fn bind(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind health server on {addr}: {err}")))
}

/// Serve the health router on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(listener: TcpListener, state: HealthState, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("health listener has no address: {err}")))?;
    info!(%local, "health server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("health server error: {err}")))
}
