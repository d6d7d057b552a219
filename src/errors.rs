//! Error types shared across the launcher.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all launcher failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// HTTP transport failure (connect, timeout, body read).
    Http(String),
    /// Control-plane answered with an error envelope or an error status.
    Api {
        /// HTTP status code returned by the control plane.
        status: u16,
        /// Message carried by the error envelope.
        message: String,
    },
    /// Requested session transition is not permitted from the current state.
    State(String),
    /// No installable release could be selected.
    Resolution(String),
    /// Release artifacts could not be installed.
    Installation(String),
    /// Archive entry or file path escapes its destination root.
    PathViolation(String),
    /// No launchable binary was found inside an install directory.
    EntrypointNotFound(String),
    /// Supervised process could not be launched or awaited.
    Process(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Http(msg) => write!(f, "http: {msg}"),
            Self::Api { status, message } => write!(f, "api error {status}: {message}"),
            Self::State(msg) => write!(f, "state: {msg}"),
            Self::Resolution(msg) => write!(f, "resolution: {msg}"),
            Self::Installation(msg) => write!(f, "installation: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::EntrypointNotFound(msg) => write!(f, "entrypoint not found: {msg}"),
            Self::Process(msg) => write!(f, "process: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
