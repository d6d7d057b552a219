//! Release version parsing and the `.version` install marker.
//!
//! The marker is exactly 12 bytes: major, minor, and patch as
//! little-endian `u32`s. A missing marker reads as `0.0.0`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use semver::{Prerelease, Version};
use tempfile::NamedTempFile;

use crate::{AppError, Result};

/// Marker file name at the root of every install directory.
pub const VERSION_FILE: &str = ".version";

/// Size of the marker in bytes.
pub const VERSION_RECORD_LEN: usize = 12;

/// Parse a release version string.
///
/// Accepts a leading `v` and missing minor or patch components
/// (`"1.2"` reads as `1.2.0`).
///
/// # Errors
///
/// Returns `AppError::Resolution` if the string is not a version.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, rest) = trimmed.split_at(split_at);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{rest}"),
        2 => format!("{core}.0{rest}"),
        _ => trimmed.to_owned(),
    };

    Version::parse(&padded)
        .map_err(|err| AppError::Resolution(format!("invalid version {raw:?}: {err}")))
}

/// Precedence key of a version: numeric triple, then pre-release.
///
/// Build metadata is ignored, so `1.0.0+a` and `1.0.0+b` tie.
#[must_use]
pub fn precedence(version: &Version) -> (u64, u64, u64, Prerelease) {
    (version.major, version.minor, version.patch, version.pre.clone())
}

/// Encode the installation record.
///
/// # Errors
///
/// Returns `AppError::Installation` if a component does not fit in `u32`.
pub fn encode_record(version: &Version) -> Result<[u8; VERSION_RECORD_LEN]> {
    let part = |value: u64, name: &str| {
        u32::try_from(value).map_err(|_| {
            AppError::Installation(format!("{name} version {value} does not fit the marker"))
        })
    };
    let mut record = [0u8; VERSION_RECORD_LEN];
    record[0..4].copy_from_slice(&part(version.major, "major")?.to_le_bytes());
    record[4..8].copy_from_slice(&part(version.minor, "minor")?.to_le_bytes());
    record[8..12].copy_from_slice(&part(version.patch, "patch")?.to_le_bytes());
    Ok(record)
}

/// Decode an installation record.
///
/// # Errors
///
/// Returns `AppError::Io` if the record is shorter than 12 bytes.
pub fn decode_record(bytes: &[u8]) -> Result<Version> {
    if bytes.len() < VERSION_RECORD_LEN {
        return Err(AppError::Io(format!(
            "version marker is {} bytes, expected {VERSION_RECORD_LEN}",
            bytes.len()
        )));
    }
    let word = |at: usize| {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[at..at + 4]);
        u64::from(u32::from_le_bytes(buf))
    };
    Ok(Version::new(word(0), word(4), word(8)))
}

/// Read the version marker of `dir`. A missing marker reads as `0.0.0`.
///
/// # Errors
///
/// Returns `AppError::Io` if the marker exists but cannot be read or is
/// truncated.
pub fn read_version(dir: &Path) -> Result<Version> {
    match fs::read(dir.join(VERSION_FILE)) {
        Ok(bytes) => decode_record(&bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Version::new(0, 0, 0)),
        Err(err) => Err(AppError::Io(format!("failed to read version marker: {err}"))),
    }
}

/// Write the version marker of `dir`, replacing any previous one.
///
/// The record is written to a temporary file in `dir` and renamed into
/// place.
///
/// # Errors
///
/// Returns `AppError::Installation` if the directory cannot be created or
/// the marker cannot be written.
pub fn write_version(dir: &Path, version: &Version) -> Result<()> {
    let record = encode_record(version)?;

    fs::create_dir_all(dir).map_err(|err| {
        AppError::Installation(format!("failed to create {}: {err}", dir.display()))
    })?;

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|err| AppError::Installation(format!("failed to create version file: {err}")))?;
    tmp.write_all(&record)
        .map_err(|err| AppError::Installation(format!("failed to write version file: {err}")))?;
    tmp.persist(dir.join(VERSION_FILE))
        .map_err(|err| AppError::Installation(format!("failed to persist version file: {err}")))?;

    Ok(())
}
