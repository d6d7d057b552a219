#![forbid(unsafe_code)]

//! Worker-side launcher for a pixel streaming application.
//!
//! Waits for the control plane to assign a session to this instance,
//! installs the latest release of the session's application, supervises
//! the application process, and reports the session lifecycle back.

pub mod api;
pub mod config;
pub mod errors;
pub mod health;
pub mod install;
pub mod models;
pub mod orchestrator;
pub mod reporter;
pub mod resolver;
pub mod supervisor;
pub mod version;

pub use config::LauncherConfig;
pub use errors::{AppError, Result};
