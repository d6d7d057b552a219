//! `reqwest`-backed control-plane client.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use super::{ApiFuture, ControlPlane};
use crate::config::Credentials;
use crate::models::envelope::Envelope;
use crate::models::release::{AppRecord, Release};
use crate::models::session::{Session, SessionStatus};
use crate::{AppError, Result};

/// Per-request timeout for control-plane calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the control-plane API.
///
/// Every call sends `Content-Type: application/json` and, once
/// [`login`](Self::login) succeeded, a bearer token.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    api_root: String,
    token: Option<String>,
}

impl HttpControlPlane {
    /// Build a client for `api_root` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Http` if the underlying client cannot be built.
    pub fn new(api_root: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_root: api_root.into(),
            token: None,
        })
    }

    /// Use an already acquired bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Whether a bearer token is attached to requests.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Authenticate with e-mail and password and keep the returned token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` on an error envelope or a missing token, and
    /// `AppError::Http` on transport failure.
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        let request = self
            .request(Method::POST, "/auth/login")
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }));
        let token: Option<String> = send(request).await?;
        let token = token.filter(|t| !t.is_empty()).ok_or_else(|| AppError::Api {
            status: 200,
            message: "login response carried no token".into(),
        })?;
        self.token = Some(token);
        info!("authenticated with control plane");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.api_root);
        let builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Send a request and unwrap the response envelope.
///
/// An empty body on a success status reads as "no payload".
async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>> {
    let response = request.send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?;

    if body.iter().all(u8::is_ascii_whitespace) {
        if status >= 400 {
            return Err(AppError::Api {
                status,
                message: "empty error response".into(),
            });
        }
        return Ok(None);
    }

    match serde_json::from_slice::<Envelope<T>>(&body) {
        Ok(envelope) => {
            let message = envelope.message.clone();
            let payload = envelope.into_result(status)?;
            if status >= 400 {
                return Err(AppError::Api {
                    status,
                    message: message.unwrap_or_else(|| "request failed".into()),
                });
            }
            Ok(payload)
        }
        Err(err) if status >= 400 => {
            debug!(%err, "error response is not an envelope");
            Err(AppError::Api {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            })
        }
        Err(err) => Err(AppError::Http(format!("invalid response body: {err}"))),
    }
}

impl ControlPlane for HttpControlPlane {
    fn pending_session(&self) -> ApiFuture<'_, Option<Session>> {
        Box::pin(async move {
            let request = self.request(Method::GET, "/pixelstreaming/session/pending");
            let session: Option<Session> = send(request).await?;
            Ok(session.filter(Session::is_assigned))
        })
    }

    fn session(&self, session_id: Uuid) -> ApiFuture<'_, Session> {
        Box::pin(async move {
            let request =
                self.request(Method::GET, &format!("/pixelstreaming/session/{session_id}"));
            let session: Option<Session> = send(request).await?;
            Ok(session.unwrap_or_default())
        })
    }

    fn set_session_status(
        &self,
        session_id: Uuid,
        app_id: Option<Uuid>,
        status: SessionStatus,
    ) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let request = self
                .request(Method::PUT, &format!("/pixelstreaming/session/{session_id}"))
                .json(&json!({ "appId": app_id, "status": status.as_str() }));
            send::<serde_json::Value>(request).await?;
            Ok(())
        })
    }

    fn set_instance_status<'a>(
        &'a self,
        instance_id: &'a str,
        status: SessionStatus,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .request(Method::PUT, "/pixelstreaming/instance/status")
                .json(&json!({ "instanceId": instance_id, "status": status.as_str() }));
            send::<serde_json::Value>(request).await?;
            Ok(())
        })
    }

    fn app_releases<'a>(&'a self, app_id: Uuid, platform: &'a str) -> ApiFuture<'a, Vec<Release>> {
        Box::pin(async move {
            let request = self.request(
                Method::GET,
                &format!("/apps/public/{app_id}?platform={platform}"),
            );
            let app: Option<AppRecord> = send(request).await?;
            Ok(app.map(|a| a.releases).unwrap_or_default())
        })
    }
}
