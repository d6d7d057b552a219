//! Streaming session model and status lifecycle.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Lifecycle status of a streaming session as tracked by the control plane.
///
/// Variants are declared in lifecycle order; a session only ever moves
/// forward through them.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Instance is idle and waiting for work.
    #[default]
    Free,
    /// Session assigned; application is being installed.
    Starting,
    /// Application process is running.
    Running,
    /// Session is over.
    Closed,
}

impl SessionStatus {
    /// Wire representation used by the control plane.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Closed => "closed",
        }
    }

    /// Parse a wire status leniently; unknown values read as [`SessionStatus::Free`].
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "starting" => Self::Starting,
            "running" => Self::Running,
            "closed" => Self::Closed,
            _ => Self::Free,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        next > self
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming session assigned to this instance by the control plane.
///
/// The launcher never edits a session in place; it only requests status
/// transitions and keeps its local copy in step with what it reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier; absent when the control plane has nothing pending.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Application the session should run.
    #[serde(default)]
    pub app_id: Option<Uuid>,
    /// World the application should open.
    #[serde(default)]
    pub world_id: Option<Uuid>,
    /// Instance the session is bound to.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Current lifecycle status.
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: SessionStatus,
}

impl Session {
    /// Whether the record identifies an actual session.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.id.is_some_and(|id| !id.is_nil())
    }
}

fn deserialize_status<'de, D>(deserializer: D) -> std::result::Result<SessionStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().map_or(SessionStatus::Free, SessionStatus::from_wire))
}
