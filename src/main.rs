#![forbid(unsafe_code)]

//! `pixel-streaming-launcher`: serves one pixel streaming session.
//!
//! Reports the instance free, starts the local health server, then hands
//! control to the session orchestrator until the session closes.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use pixel_streaming_launcher::api::http::HttpControlPlane;
use pixel_streaming_launcher::api::ControlPlane;
use pixel_streaming_launcher::config::BuildProfile;
use pixel_streaming_launcher::health::{self, HealthState};
use pixel_streaming_launcher::models::session::SessionStatus;
use pixel_streaming_launcher::orchestrator::{OrchestratorOutcome, SessionOrchestrator};
use pixel_streaming_launcher::reporter::SessionStatusReporter;
use pixel_streaming_launcher::supervisor::{AppRunner, ProcessSupervisor};
use pixel_streaming_launcher::{AppError, LauncherConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "pixel-streaming-launcher",
    about = "Install and supervise a pixel streaming application for one session",
    version,
    long_about = None
)]
struct Cli {
    /// Environment profile: debug, dev, test, or prod.
    #[arg(long, default_value = "test")]
    env: String,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Arguments forwarded verbatim to the application.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    passthrough: Vec<String>,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }
    info!("pixel-streaming-launcher bootstrap");

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))
        .and_then(|runtime| runtime.block_on(run(args)));

    match result {
        Ok(outcome) if outcome.is_success() => {
            info!(?outcome, "launcher finished");
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            error!(?outcome, "application did not exit cleanly");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(%err, "launcher failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Cli) -> Result<OrchestratorOutcome> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => LauncherConfig::load_from_path(path)?,
        None => LauncherConfig::from_env()?,
    };
    config.profile = BuildProfile::from_env_name(&args.env);
    config.passthrough_args = args.passthrough;
    config.load_credentials().await;
    info!(
        env = %args.env,
        profile = ?config.profile,
        instance_id = %config.instance_id,
        platform = %config.platform,
        "configuration loaded"
    );

    // ── Control plane ───────────────────────────────────
    let mut client = HttpControlPlane::new(config.api_root.clone())?;
    match &config.credentials {
        Some(credentials) => {
            if let Err(err) = client.login(credentials).await {
                error!(%err, "failed to login");
            }
        }
        None => warn!("starting without a control-plane token"),
    }
    let control_plane: Arc<dyn ControlPlane> = Arc::new(client);
    let reporter = Arc::new(SessionStatusReporter::new(control_plane));
    reporter
        .report_instance(&config.instance_id, SessionStatus::Free)
        .await;

    // ── Health server ───────────────────────────────────
    let ct = CancellationToken::new();
    let listener = health::bind(config.health_port).await?;
    let health_state = HealthState {
        reporter: Arc::clone(&reporter),
        close_threshold: config.health_close_threshold,
        shutdown: ct.clone(),
    };
    let server_ct = ct.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(err) = health::serve(listener, health_state, server_ct).await {
            error!(%err, "health server failed");
        }
    });

    // ── Session ─────────────────────────────────────────
    let runner: Arc<dyn AppRunner> = Arc::new(ProcessSupervisor::from_config(&config));
    let orchestrator = SessionOrchestrator::from_config(&config, reporter, runner, ct.clone())?;
    let outcome = orchestrator.run().await;

    ct.cancel();
    if let Err(err) = health_handle.await {
        warn!(%err, "health server task failed");
    }
    outcome
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
