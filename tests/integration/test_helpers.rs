//! Shared fixtures for integration tests.
//!
//! Provides an in-memory control plane, a scripted application runner, a
//! static file server on an ephemeral port, and zip archive builders so
//! individual test modules can focus on behaviour rather than plumbing.

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use pixel_streaming_launcher::api::{ApiFuture, ControlPlane};
use pixel_streaming_launcher::models::release::{FileType, Release, ReleaseFile};
use pixel_streaming_launcher::models::session::{Session, SessionStatus};
use pixel_streaming_launcher::supervisor::process::ExitOutcome;
use pixel_streaming_launcher::supervisor::{AppRunner, RunFuture};
use pixel_streaming_launcher::AppError;

/// Control-plane call observed by [`FakeControlPlane`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PendingSession,
    SessionStatus(Uuid, SessionStatus),
    InstanceStatus(String, SessionStatus),
    AppReleases(Uuid, String),
}

/// In-memory control plane.
///
/// Pending-session polls pop scripted answers; once the script is empty
/// every poll returns `None`. Status transitions update the live status
/// the health endpoint reads back.
#[derive(Default)]
pub struct FakeControlPlane {
    pending: Mutex<VecDeque<Option<Session>>>,
    live: Mutex<SessionStatus>,
    releases: Mutex<Vec<Release>>,
    failing_status: Mutex<Option<SessionStatus>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_pending(&self, session: Option<Session>) {
        self.pending.lock().unwrap().push_back(session);
    }

    pub fn set_releases(&self, releases: Vec<Release>) {
        *self.releases.lock().unwrap() = releases;
    }

    pub fn set_live(&self, status: SessionStatus) {
        *self.live.lock().unwrap() = status;
    }

    /// Make every request for `status` fail with an API error.
    pub fn fail_status(&self, status: SessionStatus) {
        *self.failing_status.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Session statuses requested so far, in order.
    pub fn reported(&self) -> Vec<SessionStatus> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SessionStatus(_, status) => Some(status),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ControlPlane for FakeControlPlane {
    fn pending_session(&self) -> ApiFuture<'_, Option<Session>> {
        Box::pin(async move {
            self.record(Call::PendingSession);
            let next = self.pending.lock().unwrap().pop_front().flatten();
            Ok(next)
        })
    }

    fn session(&self, session_id: Uuid) -> ApiFuture<'_, Session> {
        Box::pin(async move {
            let status = *self.live.lock().unwrap();
            Ok(Session {
                id: Some(session_id),
                status,
                ..Session::default()
            })
        })
    }

    fn set_session_status(
        &self,
        session_id: Uuid,
        _app_id: Option<Uuid>,
        status: SessionStatus,
    ) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            self.record(Call::SessionStatus(session_id, status));
            if *self.failing_status.lock().unwrap() == Some(status) {
                return Err(AppError::Api {
                    status: 500,
                    message: format!("cannot set {status}"),
                });
            }
            *self.live.lock().unwrap() = status;
            Ok(())
        })
    }

    fn set_instance_status<'a>(
        &'a self,
        instance_id: &'a str,
        status: SessionStatus,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.record(Call::InstanceStatus(instance_id.to_owned(), status));
            Ok(())
        })
    }

    fn app_releases<'a>(&'a self, app_id: Uuid, platform: &'a str) -> ApiFuture<'a, Vec<Release>> {
        Box::pin(async move {
            self.record(Call::AppReleases(app_id, platform.to_owned()));
            Ok(self.releases.lock().unwrap().clone())
        })
    }
}

/// Session pending for `app_id`.
pub fn pending_session(app_id: Uuid) -> Session {
    Session {
        id: Some(Uuid::new_v4()),
        app_id: Some(app_id),
        world_id: Some(Uuid::new_v4()),
        instance_id: Some("i-test".into()),
        status: SessionStatus::Free,
    }
}

/// How [`ScriptedRunner`] behaves when asked to run.
#[derive(Debug, Clone)]
pub enum Script {
    Exit(ExitOutcome),
    Fail(String),
    /// Never finishes; used to exercise cancellation.
    Hang,
}

/// Application runner that records install directories and follows a script.
pub struct ScriptedRunner {
    script: Script,
    runs: Mutex<Vec<PathBuf>>,
}

impl ScriptedRunner {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            runs: Mutex::new(Vec::new()),
        })
    }

    pub fn runs(&self) -> Vec<PathBuf> {
        self.runs.lock().unwrap().clone()
    }
}

impl AppRunner for ScriptedRunner {
    fn run<'a>(&'a self, install_dir: &'a Path) -> RunFuture<'a> {
        Box::pin(async move {
            self.runs.lock().unwrap().push(install_dir.to_path_buf());
            match &self.script {
                Script::Exit(outcome) => Ok(outcome.clone()),
                Script::Fail(reason) => Err(AppError::EntrypointNotFound(reason.clone())),
                Script::Hang => std::future::pending().await,
            }
        })
    }
}

/// Static file server on an ephemeral port.
pub struct FileServer {
    pub base_url: String,
    ct: CancellationToken,
}

impl FileServer {
    /// Serve `files` under `/files/{name}`; unknown names answer 404.
    pub async fn start(files: HashMap<String, Vec<u8>>) -> Self {
        async fn serve_file(
            State(files): State<Arc<HashMap<String, Vec<u8>>>>,
            UrlPath(name): UrlPath<String>,
        ) -> Result<Bytes, StatusCode> {
            files
                .get(&name)
                .map(|body| Bytes::from(body.clone()))
                .ok_or(StatusCode::NOT_FOUND)
        }

        let router = Router::new()
            .route("/files/{name}", get(serve_file))
            .with_state(Arc::new(files));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral");
        let addr = listener.local_addr().expect("local addr");
        let ct = CancellationToken::new();
        let server_ct = ct.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move { server_ct.cancelled().await })
                .await;
        });

        Self {
            base_url: format!("http://{addr}"),
            ct,
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}/files/{name}", self.base_url)
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}

/// Discrete release file served as `name`.
pub fn release_file(server: &FileServer, name: &str, size: u64, original_path: Option<&str>) -> ReleaseFile {
    ReleaseFile {
        id: Uuid::new_v4(),
        file_type: FileType::Release,
        url: server.url(name),
        size: Some(size),
        original_path: original_path.map(str::to_owned),
    }
}

/// Archive file served as `name`.
pub fn archive_file(server: &FileServer, name: &str, size: u64) -> ReleaseFile {
    ReleaseFile {
        id: Uuid::new_v4(),
        file_type: FileType::ReleaseArchive,
        url: server.url(name),
        size: Some(size),
        original_path: None,
    }
}

/// Build a zip archive in memory from `(entry name, contents)` pairs.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                .expect("add directory");
            continue;
        }
        let options = SimpleFileOptions::default().unix_permissions(0o755);
        writer.start_file(*name, options).expect("start file");
        writer.write_all(contents).expect("write entry");
    }
    writer.finish().expect("finish archive").into_inner()
}

/// Minimal ELF header used to make files look executable.
pub const ELF_STUB: &[u8] = b"\x7fELF\x02\x01\x01\x00stub";
