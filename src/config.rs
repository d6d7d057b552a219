//! Launcher configuration parsing, environment overlay, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// Keychain service name used for credential lookup.
pub const KEYRING_SERVICE: &str = "pixel-streaming-launcher";

/// Scratch directory (relative to the work dir) that holds in-flight downloads.
pub const TEMP_DIR: &str = ".tmp";
/// Subdirectory of [`TEMP_DIR`] dedicated to downloads.
pub const DOWNLOAD_DIR: &str = "downloads";
/// Root directory (relative to the work dir) for installed releases.
pub const APP_DIR: &str = "apps";

/// Build-configuration name fragments that identify launchable binaries.
pub const KNOWN_BUILD_SUFFIXES: [&str; 4] = ["Debug", "DebugGame", "Test", "Shipping"];

/// Build configuration of the application binaries to launch.
///
/// Selected by the `--env` flag; determines which binary suffix the
/// entrypoint search looks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildProfile {
    /// `DebugGame` binaries.
    Debug,
    /// Unsuffixed development binaries.
    #[default]
    Development,
    /// `Test` binaries.
    Test,
    /// `Shipping` binaries.
    Shipping,
}

impl BuildProfile {
    /// Map an environment name to a profile. Unknown names fall back to
    /// [`BuildProfile::Development`].
    #[must_use]
    pub fn from_env_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "test" => Self::Test,
            "prod" | "production" | "shipping" => Self::Shipping,
            _ => Self::Development,
        }
    }

    /// Binary suffix for this profile on the current OS.
    #[must_use]
    pub fn binary_suffix(self) -> &'static str {
        self.binary_suffix_for(cfg!(windows))
    }

    /// Binary suffix for this profile on Windows (`windows == true`) or
    /// any other OS.
    #[must_use]
    pub fn binary_suffix_for(self, windows: bool) -> &'static str {
        match (self, windows) {
            (Self::Debug, true) => "DebugGame.exe",
            (Self::Development, true) => ".exe",
            (Self::Test, true) => "Test.exe",
            (Self::Shipping, true) => "Shipping.exe",
            (Self::Debug, false) => "DebugGame",
            (Self::Development, false) => "",
            (Self::Test, false) => "Test",
            (Self::Shipping, false) => "Shipping",
        }
    }
}

/// Streaming transport parameters passed to the supervised application.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StreamingConfig {
    /// Address the application binds its streaming endpoint to.
    #[serde(default = "default_streaming_ip")]
    pub ip: String,
    /// Port of the streaming endpoint.
    #[serde(default = "default_streaming_port")]
    pub port: u16,
    /// Forced horizontal resolution.
    #[serde(default = "default_res_x")]
    pub res_x: u32,
    /// Forced vertical resolution.
    #[serde(default = "default_res_y")]
    pub res_y: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            ip: default_streaming_ip(),
            port: default_streaming_port(),
            res_x: default_res_x(),
            res_y: default_res_y(),
        }
    }
}

fn default_streaming_ip() -> String {
    "127.0.0.1".into()
}

fn default_streaming_port() -> u16 {
    8888
}

fn default_res_x() -> u32 {
    1920
}

fn default_res_y() -> u32 {
    1080
}

fn default_poll_interval() -> u64 {
    30
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_health_port() -> u16 {
    8080
}

fn default_close_threshold() -> u32 {
    20
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Platform name used to scope release lookups.
#[must_use]
pub fn default_platform() -> String {
    if cfg!(windows) {
        "Win64".into()
    } else if cfg!(target_os = "macos") {
        "Mac".into()
    } else {
        "Linux".into()
    }
}

/// Control-plane login credentials, loaded at runtime only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account e-mail.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Launcher configuration.
///
/// Parsed from an optional TOML file, then overlaid with environment
/// variables (`VE_API2_ROOT_URL`, `INSTANCE_ID`). Credentials and CLI-only
/// settings are never read from the file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LauncherConfig {
    /// Control-plane API root, without trailing slash.
    #[serde(default)]
    pub api_root: String,
    /// Identifier of the instance this launcher runs on.
    #[serde(default)]
    pub instance_id: String,
    /// Directory under which scratch and install trees live.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Seconds between pending-session polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Multiplier applied to the poll interval after each empty poll.
    /// `1.0` keeps the interval fixed.
    #[serde(default = "default_backoff_factor")]
    pub poll_backoff_factor: f64,
    /// Upper bound for the poll interval once backoff applies.
    #[serde(default = "default_poll_interval")]
    pub poll_max_interval_seconds: u64,
    /// Port of the local health server.
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    /// Health-check count at which a running session is force-closed.
    #[serde(default = "default_close_threshold")]
    pub health_close_threshold: u32,
    /// Platform name sent with release lookups.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Streaming transport flags.
    #[serde(default)]
    pub streaming: StreamingConfig,
    /// Build configuration selected on the command line.
    #[serde(skip)]
    pub profile: BuildProfile,
    /// Extra arguments forwarded verbatim to the application.
    #[serde(skip)]
    pub passthrough_args: Vec<String>,
    /// Login credentials (populated at runtime).
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            api_root: String::new(),
            instance_id: String::new(),
            work_dir: default_work_dir(),
            poll_interval_seconds: default_poll_interval(),
            poll_backoff_factor: default_backoff_factor(),
            poll_max_interval_seconds: default_poll_interval(),
            health_port: default_health_port(),
            health_close_threshold: default_close_threshold(),
            platform: default_platform(),
            streaming: StreamingConfig::default(),
            profile: BuildProfile::default(),
            passthrough_args: Vec::new(),
            credentials: None,
        }
    }
}

impl LauncherConfig {
    /// Load configuration from a TOML file path, overlay environment
    /// variables, and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string, overlay environment
    /// variables, and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults and the process environment only.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if validation fails.
    pub fn from_env() -> Result<Self> {
        Self::from_toml_str("")
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(root) = non_empty("VE_API2_ROOT_URL") {
            self.api_root = root;
        }
        if let Some(id) = non_empty("INSTANCE_ID") {
            self.instance_id = id;
        }
    }

    /// Load login credentials from OS keychain with env-var fallback.
    ///
    /// Missing credentials are not an error: the launcher proceeds without
    /// a token.
    pub async fn load_credentials(&mut self) {
        let email = load_credential("user_email", "USER_EMAIL").await;
        let password = load_credential("user_password", "USER_PASSWORD").await;
        self.credentials = match (email, password) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => {
                warn!("no control-plane credentials found; continuing unauthenticated");
                None
            }
        };
    }

    /// Scratch directory for in-flight downloads.
    #[must_use]
    pub fn scratch_root(&self) -> PathBuf {
        self.work_dir.join(TEMP_DIR).join(DOWNLOAD_DIR)
    }

    /// Root directory for installed releases.
    #[must_use]
    pub fn apps_root(&self) -> PathBuf {
        self.work_dir.join(APP_DIR)
    }

    /// Base interval between pending-session polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Upper bound for the backoff-adjusted poll interval.
    #[must_use]
    pub fn poll_max_interval(&self) -> Duration {
        Duration::from_secs(self.poll_max_interval_seconds.max(self.poll_interval_seconds))
    }

    /// Binary suffix of the configured build profile on this OS.
    #[must_use]
    pub fn binary_suffix(&self) -> &'static str {
        self.profile.binary_suffix()
    }

    fn validate(&mut self) -> Result<()> {
        let root = self.api_root.trim().trim_end_matches('/');
        if root.is_empty() {
            return Err(AppError::Config("invalid VE_API2_ROOT_URL env".into()));
        }
        self.api_root = root.to_owned();

        if self.poll_interval_seconds == 0 {
            return Err(AppError::Config(
                "poll_interval_seconds must be greater than zero".into(),
            ));
        }

        if !self.poll_backoff_factor.is_finite() || self.poll_backoff_factor < 1.0 {
            return Err(AppError::Config(
                "poll_backoff_factor must be at least 1.0".into(),
            ));
        }

        if self.health_close_threshold == 0 {
            return Err(AppError::Config(
                "health_close_threshold must be greater than zero".into(),
            ));
        }

        if self.work_dir.is_relative() {
            let cwd = env::current_dir()
                .map_err(|err| AppError::Config(format!("cannot resolve work dir: {err}")))?;
            self.work_dir = cwd.join(&self.work_dir);
        }

        debug!(work_dir = %self.work_dir.display(), api_root = %self.api_root, "configuration validated");
        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Option<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await;

    match keychain_result {
        Ok(Ok(value)) if !value.is_empty() => return Some(value),
        Ok(Ok(_)) => {
            debug!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Ok(Err(err)) => {
            debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
        Err(err) => {
            warn!(key = keyring_key, %err, "keychain task panicked, trying env var");
        }
    }

    env::var(env_key).ok().filter(|v| !v.is_empty())
}
