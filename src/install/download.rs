//! Streaming file download primitive.

use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tokio::fs::{self, File};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use super::progress::ProgressTracker;
use crate::config::KNOWN_BUILD_SUFFIXES;
use crate::supervisor::entrypoint::has_executable_header;
use crate::{AppError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Byte-counting sink: writes each chunk through to `inner` and reports
/// progress once the chunk is written.
struct CountingSink<W, F> {
    inner: W,
    tracker: ProgressTracker<F>,
}

impl<W, F> CountingSink<W, F>
where
    W: AsyncWrite + Unpin,
    F: FnMut(u64, u64),
{
    async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(chunk).await?;
        self.tracker.record(chunk.len());
        Ok(())
    }

    async fn finish(mut self) -> std::io::Result<u64> {
        self.inner.flush().await?;
        Ok(self.tracker.current())
    }
}

/// HTTP downloader streaming response bodies to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Build a downloader. Only connecting is time-limited; bodies may take
    /// as long as they need.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { client })
    }

    /// Download `url` to `path`, overwriting any existing file.
    ///
    /// `progress` receives `(bytes_so_far, total)` after every chunk, where
    /// `total` is the response `Content-Length` when known and
    /// `expected_size` otherwise. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` on file-system failures and `AppError::Http`
    /// on transport failures or a non-200 response.
    pub async fn download<F>(
        &self,
        url: &str,
        path: &Path,
        expected_size: Option<u64>,
        progress: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, u64) + Send,
    {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed stale download"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(AppError::Io(format!(
                    "failed to remove {}: {err}",
                    path.display()
                )))
            }
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Http(format!("failed to send GET {url}: {err}")))?;

        if response.status() != StatusCode::OK {
            return Err(AppError::Http(format!(
                "failed to download {url} to {}: bad status {}",
                path.display(),
                response.status()
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                AppError::Io(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let file = File::create(path)
            .await
            .map_err(|err| AppError::Io(format!("failed to create {}: {err}", path.display())))?;

        let mut tracker = ProgressTracker::new(expected_size.unwrap_or(0), progress);
        if let Some(length) = response.content_length() {
            tracker.set_total(length);
        }
        let mut sink = CountingSink {
            inner: BufWriter::new(file),
            tracker,
        };

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| AppError::Http(format!("failed to read body of {url}: {err}")))?
        {
            sink.write_chunk(&chunk).await.map_err(|err| {
                AppError::Io(format!("failed to write {}: {err}", path.display()))
            })?;
        }

        let written = sink
            .finish()
            .await
            .map_err(|err| AppError::Io(format!("failed to flush {}: {err}", path.display())))?;

        if let Err(err) = mark_if_executable(path) {
            warn!(path = %path.display(), %err, "failed to mark download executable");
        }

        debug!(url, path = %path.display(), bytes = written, "download complete");
        Ok(written)
    }
}

/// Whether the file name carries a known build-configuration suffix.
fn has_build_suffix(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let stem = name.strip_suffix(".exe").unwrap_or(name);
    KNOWN_BUILD_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix))
}

fn mark_if_executable(path: &Path) -> std::io::Result<()> {
    if has_build_suffix(path) || has_executable_header(path)? {
        set_executable(path)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
