//! Entrypoint discovery inside an installed release.
//!
//! A candidate is a regular file whose name ends with the build profile's
//! binary suffix, that sits under a `Binaries` directory but not under
//! `Engine` or `EpicWebHelper`, and whose header identifies a native
//! executable (ELF, PE, or Mach-O). Shared libraries and debug symbol
//! files are skipped even though they carry the same headers.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{AppError, Result};

/// Directory segment required on the entrypoint path.
const BINARIES_SEGMENT: &str = "Binaries";
/// Directory segments that exclude a path.
const EXCLUDED_SEGMENTS: [&str; 2] = ["Engine", "EpicWebHelper"];
/// Levels between the entrypoint and its project root
/// (`<root>/<Project>/Binaries/<Platform>/<binary>`).
const PROJECT_DEPTH: usize = 4;

/// Extensions of files that are never entrypoints.
const NON_ENTRYPOINT_EXTENSIONS: [&str; 6] = ["so", "dylib", "dll", "debug", "sym", "pdb"];

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const PE_MAGIC: [u8; 2] = [b'M', b'Z'];
const MACHO_MAGICS: [[u8; 4]; 5] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xcf, 0xfa, 0xed, 0xfe],
    [0xca, 0xfe, 0xba, 0xbe],
];

/// Whether `header` starts with a native executable signature.
#[must_use]
pub fn is_executable_header(header: &[u8]) -> bool {
    header.starts_with(&ELF_MAGIC)
        || header.starts_with(&PE_MAGIC)
        || MACHO_MAGICS.iter().any(|magic| header.starts_with(magic))
}

/// Read the first bytes of `path` and check for an executable signature.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be opened or read.
pub fn has_executable_header(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 4];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        let n = file.read(&mut header[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(is_executable_header(&header[..filled]))
}

/// Shared libraries and debug companions also carry executable headers.
fn is_library_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains(".so.")
        || NON_ENTRYPOINT_EXTENSIONS
            .iter()
            .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Whether `relative` (a path below the install root) names a candidate
/// by location and suffix alone.
#[must_use]
pub fn is_candidate_path(relative: &Path, suffix: &str) -> bool {
    let Some(name) = relative.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if !name.ends_with(suffix) {
        return false;
    }

    if is_library_name(name) {
        return false;
    }

    let segments = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| c.as_os_str().to_str());
    let mut in_binaries = false;
    for segment in segments {
        if EXCLUDED_SEGMENTS.contains(&segment) {
            return false;
        }
        if segment == BINARIES_SEGMENT {
            in_binaries = true;
        }
    }
    in_binaries
}

/// Search `root` recursively for the application entrypoint.
///
/// Directories are visited in sorted order; when several candidates match,
/// the last one visited wins. Returns an absolute path.
///
/// # Errors
///
/// Returns `AppError::EntrypointNotFound` if no candidate matches and
/// `AppError::Io` if the tree cannot be walked.
pub fn find_entrypoint(root: &Path, suffix: &str) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|err| {
        AppError::EntrypointNotFound(format!("install directory {} invalid: {err}", root.display()))
    })?;

    let mut found = None;
    walk(&root, &root, suffix, &mut found)
        .map_err(|err| AppError::Io(format!("failed to walk {}: {err}", root.display())))?;

    found.ok_or_else(|| {
        AppError::EntrypointNotFound(format!(
            "no executable with suffix {suffix:?} under {}",
            root.display()
        ))
    })
}

fn walk(root: &Path, dir: &Path, suffix: &str, found: &mut Option<PathBuf>) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, suffix, found)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if !is_candidate_path(relative, suffix) {
            continue;
        }

        match has_executable_header(&path) {
            Ok(true) => {
                debug!(path = %path.display(), "entrypoint candidate");
                *found = Some(path);
            }
            Ok(false) => {}
            Err(err) => warn!(path = %path.display(), %err, "cannot inspect candidate"),
        }
    }
    Ok(())
}

/// Project name of an entrypoint: its file name without the build suffix.
#[must_use]
pub fn project_name(entrypoint: &Path, suffix: &str) -> String {
    let name = entrypoint
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(suffix) {
        Some(stripped) if !suffix.is_empty() => stripped.to_owned(),
        _ => name,
    }
}

/// Entrypoint expressed relative to its project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntrypoint {
    /// Working directory for the application.
    pub project_dir: PathBuf,
    /// Entrypoint relative to `project_dir`.
    pub relative: PathBuf,
}

impl NormalizedEntrypoint {
    /// Absolute program path (`project_dir` joined with `relative`).
    #[must_use]
    pub fn program(&self) -> PathBuf {
        self.project_dir.join(&self.relative)
    }
}

/// Derive the project root four levels above `entrypoint` and express the
/// entrypoint relative to it.
///
/// Shallower paths use their outermost ancestor as the root.
#[must_use]
pub fn normalize_entrypoint(entrypoint: &Path) -> NormalizedEntrypoint {
    let project_dir = entrypoint
        .ancestors()
        .nth(PROJECT_DEPTH)
        .or_else(|| entrypoint.ancestors().last())
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let relative = entrypoint
        .strip_prefix(&project_dir)
        .map_or_else(|_| entrypoint.to_path_buf(), Path::to_path_buf);

    NormalizedEntrypoint {
        project_dir,
        relative,
    }
}
