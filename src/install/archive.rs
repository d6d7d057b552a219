//! Zip archive extraction with destination containment.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, info};
use zip::ZipArchive;

use super::path_safety::contained_path;
use crate::{AppError, Result};

/// Extract `archive_path` into `destination`, returning the number of
/// entries written.
///
/// Every entry is resolved through [`contained_path`]; the first entry that
/// would land outside `destination` aborts extraction with
/// `AppError::PathViolation`. Entries already written stay on disk.
///
/// # Errors
///
/// Returns `AppError::Installation` if the archive cannot be opened or
/// read, `AppError::PathViolation` for escaping entries, and
/// `AppError::Io` for file-system failures.
pub fn extract_archive(archive_path: &Path, destination: &Path) -> Result<usize> {
    info!(
        archive = %archive_path.display(),
        destination = %destination.display(),
        "extracting archive"
    );

    let file = File::open(archive_path).map_err(|err| {
        AppError::Installation(format!("failed to open {}: {err}", archive_path.display()))
    })?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| AppError::Installation(format!("failed to read archive: {err}")))?;

    fs::create_dir_all(destination).map_err(|err| {
        AppError::Io(format!("failed to create {}: {err}", destination.display()))
    })?;

    let mut written = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| AppError::Installation(format!("failed to read entry {index}: {err}")))?;

        let target = contained_path(destination, entry.name())?;

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| {
                AppError::Io(format!("failed to create {}: {err}", target.display()))
            })?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                AppError::Io(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let mut out = File::create(&target)
            .map_err(|err| AppError::Io(format!("failed to create {}: {err}", target.display())))?;
        io::copy(&mut entry, &mut out)
            .map_err(|err| AppError::Io(format!("failed to write {}: {err}", target.display())))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let mode = mode & 0o7777;
            if mode != 0 {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode)).map_err(|err| {
                    AppError::Io(format!("failed to set mode on {}: {err}", target.display()))
                })?;
            }
        }

        debug!(entry = entry.name(), "extracted");
        written += 1;
    }

    info!(files = written, "archive extracted");
    Ok(written)
}
