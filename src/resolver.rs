//! Release resolution: pick the release to install for an application.

use std::sync::Arc;

use semver::Version;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::ControlPlane;
use crate::models::release::Release;
use crate::version::{parse_version, precedence};
use crate::{AppError, Result};

/// Resolves the latest release of an application for one platform.
pub struct ReleaseResolver {
    control_plane: Arc<dyn ControlPlane>,
    platform: String,
}

impl ReleaseResolver {
    /// Create a resolver that scopes lookups to `platform`.
    #[must_use]
    pub fn new(control_plane: Arc<dyn ControlPlane>, platform: impl Into<String>) -> Self {
        Self {
            control_plane,
            platform: platform.into(),
        }
    }

    /// Fetch the application's releases and select the one to install.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Resolution` if `app_id` is unset or nil, the
    /// collection is empty, or any version fails to parse. Control-plane
    /// failures propagate unchanged.
    pub async fn resolve(&self, app_id: Option<Uuid>) -> Result<Release> {
        let app_id = app_id
            .filter(|id| !id.is_nil())
            .ok_or_else(|| AppError::Resolution("app id is not set".into()))?;

        let releases = self
            .control_plane
            .app_releases(app_id, &self.platform)
            .await?;
        debug!(%app_id, platform = %self.platform, count = releases.len(), "fetched releases");

        let release = select_latest(&releases)?;
        info!(%app_id, release_id = %release.id, version = %release.version, "release resolved");
        Ok(release)
    }
}

/// Select the release with the greatest semantic version.
///
/// Ties keep the first-seen release. The selection is returned as an
/// owned copy.
///
/// # Errors
///
/// Returns `AppError::Resolution` if `releases` is empty or any entry's
/// version fails to parse; no partial result is produced.
pub fn select_latest(releases: &[Release]) -> Result<Release> {
    let mut selected: Option<(&Release, Version)> = None;

    for release in releases {
        let version = parse_version(&release.version)?;
        let replace = match &selected {
            None => true,
            Some((_, best)) => precedence(&version) > precedence(best),
        };
        if replace {
            selected = Some((release, version));
        }
    }

    selected
        .map(|(release, _)| release.clone())
        .ok_or_else(|| AppError::Resolution("failed to find latest version".into()))
}
