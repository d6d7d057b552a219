//! Destination-root containment checks.
//!
//! Every path the installer writes (archive entries, relocated release
//! files) is resolved through [`contained_path`] so that nothing lands
//! outside the directory it belongs to.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Resolve `candidate` beneath `root`, rejecting any escape.
///
/// Canonicalizes the root and normalizes the candidate lexically. `..`
/// segments may only pop segments the candidate itself introduced.
/// Returns the absolute resolved path.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - The root cannot be canonicalized.
/// - The candidate is absolute or carries a drive prefix.
/// - A `..` segment climbs above the root.
/// - The candidate is empty after normalization.
/// - The resolved path exists and is a symlink whose target escapes.
pub fn contained_path(root: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let candidate = candidate.as_ref();
    let root = root.canonicalize().map_err(|err| {
        AppError::PathViolation(format!("destination root {} invalid: {err}", root.display()))
    })?;

    let mut normalized = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(AppError::PathViolation(format!(
                        "{} escapes {}",
                        candidate.display(),
                        root.display()
                    )));
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(AppError::PathViolation(format!(
                    "{} is absolute",
                    candidate.display()
                )));
            }
            Component::Normal(part) => normalized.push(part),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(AppError::PathViolation(format!(
            "{} resolves to the destination root itself",
            candidate.display()
        )));
    }

    let absolute = root.join(normalized);

    // Existing paths may be symlinks; the final target must stay inside.
    if absolute.symlink_metadata().is_ok() {
        if let Ok(canonical) = absolute.canonicalize() {
            if !canonical.starts_with(&root) {
                return Err(AppError::PathViolation(format!(
                    "{} links outside {}",
                    candidate.display(),
                    root.display()
                )));
            }
        }
    }

    Ok(absolute)
}
