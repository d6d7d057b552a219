//! Release and release-file models returned by the app catalogue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{deserialize_entities, serialize_entities};

/// Role of a file attached to a release.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    /// One of the discrete files of a multi-file release.
    Release,
    /// The single bundle of an archive release.
    ReleaseArchive,
    /// Any other attachment (icons, manifests, ...).
    #[serde(other)]
    Other,
}

/// Downloadable file belonging to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseFile {
    /// File identifier.
    pub id: Uuid,
    /// File role.
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Source URL.
    pub url: String,
    /// Declared size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Path relative to the install root; required to place discrete files.
    #[serde(default)]
    pub original_path: Option<String>,
}

/// Versioned build of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Release identifier.
    pub id: Uuid,
    /// Semantic version string.
    pub version: String,
    /// Whether the release ships as a single archive.
    #[serde(default)]
    pub archive: bool,
    /// Attached files, in catalogue order.
    #[serde(
        default,
        deserialize_with = "deserialize_entities",
        serialize_with = "serialize_entities"
    )]
    pub files: Vec<ReleaseFile>,
}

impl Release {
    /// Files of the given role, in catalogue order.
    pub fn files_of_type(&self, file_type: FileType) -> impl Iterator<Item = &ReleaseFile> {
        self.files.iter().filter(move |f| f.file_type == file_type)
    }

    /// Name of the install directory for this release (`<id>-<version>`).
    #[must_use]
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.id, self.version)
    }
}

/// Application record as returned by the public app endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    /// Application identifier.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Releases published for the requested platform.
    #[serde(
        default,
        deserialize_with = "deserialize_entities",
        serialize_with = "serialize_entities"
    )]
    pub releases: Vec<Release>,
}
