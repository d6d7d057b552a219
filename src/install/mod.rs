//! Release artifact installation.
//!
//! Materializes a resolved release into
//! `<apps>/<appId>/<releaseId>-<version>`, downloading through a scratch
//! directory at `<scratch>/<appId>/<releaseId>-<version>`. Both paths are
//! pure functions of the app and release, so re-installing a release
//! reuses them.
//!
//! Archive releases are all-or-nothing. Multi-file releases are best
//! effort: a file that fails to download or move is logged and skipped.

pub mod archive;
pub mod download;
pub mod path_safety;
pub mod progress;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use self::download::Downloader;
use self::path_safety::contained_path;
use self::progress::AggregateProgress;
use crate::config::LauncherConfig;
use crate::models::release::{FileType, Release, ReleaseFile};
use crate::version::{parse_version, write_version};
use crate::{AppError, Result};

/// Scratch and install roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    scratch_root: PathBuf,
    apps_root: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at explicit scratch and install directories.
    #[must_use]
    pub fn new(scratch_root: impl Into<PathBuf>, apps_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            apps_root: apps_root.into(),
        }
    }

    /// Layout under the configured work directory.
    #[must_use]
    pub fn from_config(config: &LauncherConfig) -> Self {
        Self::new(config.scratch_root(), config.apps_root())
    }

    /// Final install directory of `release`.
    #[must_use]
    pub fn install_dir(&self, app_id: Uuid, release: &Release) -> PathBuf {
        self.apps_root
            .join(app_id.to_string())
            .join(release.dir_name())
    }

    /// Scratch download directory of `release`.
    #[must_use]
    pub fn temp_dir(&self, app_id: Uuid, release: &Release) -> PathBuf {
        self.scratch_root
            .join(app_id.to_string())
            .join(release.dir_name())
    }
}

/// Downloads and installs release artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactInstaller {
    layout: InstallLayout,
    downloader: Downloader,
}

impl ArtifactInstaller {
    /// Create an installer over `layout`.
    #[must_use]
    pub fn new(layout: InstallLayout, downloader: Downloader) -> Self {
        Self { layout, downloader }
    }

    /// Directory layout in use.
    #[must_use]
    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Install `release` of `app_id` and return the install directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Installation` if the release lacks the files its
    /// mode requires, its version does not parse, the archive cannot be
    /// downloaded or extracted, or the version marker cannot be written.
    /// Returns `AppError::PathViolation` for archive entries escaping the
    /// install directory.
    pub async fn install(&self, app_id: Uuid, release: &Release) -> Result<PathBuf> {
        let span = info_span!(
            "install",
            %app_id,
            release_id = %release.id,
            version = %release.version,
            archive = release.archive
        );
        async {
            if release.archive {
                self.install_archive(app_id, release).await
            } else {
                self.install_files(app_id, release).await
            }
        }
        .instrument(span)
        .await
    }

    async fn install_archive(&self, app_id: Uuid, release: &Release) -> Result<PathBuf> {
        let archive = release
            .files_of_type(FileType::ReleaseArchive)
            .next()
            .ok_or_else(|| AppError::Installation("no archive file found".into()))?;
        debug!(file_id = %archive.id, url = %archive.url, "found archive file");

        let version = parse_version(&release.version)
            .map_err(|err| AppError::Installation(format!("failed to parse release version: {err}")))?;

        let temp_dir = self.layout.temp_dir(app_id, release);
        let install_dir = self.layout.install_dir(app_id, release);
        let archive_path = temp_dir.join(format!("{}.zip", archive.id));

        let mut overall = AggregateProgress::new(archive.size.unwrap_or(0));
        self.downloader
            .download(&archive.url, &archive_path, archive.size, |current, _total| {
                overall.update(current);
            })
            .await
            .map_err(|err| AppError::Installation(format!("failed to download archive: {err}")))?;

        let extract_from = archive_path.clone();
        let extract_to = install_dir.clone();
        tokio::task::spawn_blocking(move || archive::extract_archive(&extract_from, &extract_to))
            .await
            .map_err(|err| AppError::Installation(format!("extraction task failed: {err}")))??;

        write_version(&install_dir, &version)?;
        remove_temp_dir(&temp_dir).await?;

        info!(install_dir = %install_dir.display(), "archive release installed");
        Ok(install_dir)
    }

    async fn install_files(&self, app_id: Uuid, release: &Release) -> Result<PathBuf> {
        let files: Vec<&ReleaseFile> = release.files_of_type(FileType::Release).collect();
        if files.is_empty() {
            return Err(AppError::Installation("no release files found".into()));
        }

        let version = parse_version(&release.version)
            .map_err(|err| AppError::Installation(format!("failed to parse release version: {err}")))?;

        let temp_dir = self.layout.temp_dir(app_id, release);
        let install_dir = self.layout.install_dir(app_id, release);
        for dir in [&temp_dir, &install_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|err| {
                AppError::Installation(format!("failed to create {}: {err}", dir.display()))
            })?;
        }

        let total_size: u64 = files.iter().filter_map(|f| f.size).sum();
        debug!(files = files.len(), total_size, "downloading release files");

        let mut overall = AggregateProgress::new(total_size);
        let mut downloaded: Vec<(&ReleaseFile, PathBuf)> = Vec::with_capacity(files.len());
        for file in &files {
            let relative = file
                .original_path
                .clone()
                .unwrap_or_else(|| file.id.to_string());
            let target = match contained_path(&temp_dir, &relative) {
                Ok(target) => target,
                Err(err) => {
                    error!(file_id = %file.id, %err, "skipping release file");
                    continue;
                }
            };

            overall.start_file();
            let result = self
                .downloader
                .download(&file.url, &target, file.size, |current, _total| {
                    overall.update(current);
                })
                .await;
            match result {
                Ok(_) => downloaded.push((file, target)),
                Err(err) => error!(file_id = %file.id, %err, "failed to download file"),
            }
        }
        info!(
            downloaded = downloaded.len(),
            requested = files.len(),
            bytes = overall.done(),
            total_size = overall.total(),
            "release files downloaded"
        );

        for (file, source) in downloaded {
            let Some(original_path) = file.original_path.as_deref() else {
                warn!(file_id = %file.id, "file has no original path");
                continue;
            };
            let destination = match contained_path(&install_dir, original_path) {
                Ok(destination) => destination,
                Err(err) => {
                    error!(file_id = %file.id, %err, "refusing to place file");
                    continue;
                }
            };
            if let Err(err) = move_file(&source, &destination).await {
                error!(file_id = %file.id, %err, "failed to move file");
            }
        }

        write_version(&install_dir, &version)?;
        remove_temp_dir(&temp_dir).await?;

        info!(install_dir = %install_dir.display(), "release installed");
        Ok(install_dir)
    }
}

/// Move `source` to `destination`, creating parents and falling back to
/// copy-and-remove across devices.
async fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| AppError::Io(format!("failed to create {}: {err}", parent.display())))?;
    }

    if tokio::fs::rename(source, destination).await.is_ok() {
        return Ok(());
    }

    tokio::fs::copy(source, destination).await.map_err(|err| {
        AppError::Io(format!(
            "failed to move {} to {}: {err}",
            source.display(),
            destination.display()
        ))
    })?;
    tokio::fs::remove_file(source)
        .await
        .map_err(|err| AppError::Io(format!("failed to remove {}: {err}", source.display())))
}

async fn remove_temp_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed temporary download directory");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::Installation(format!(
            "failed to remove temporary download directory {}: {err}",
            dir.display()
        ))),
    }
}
