//! Control-plane response envelope.

use serde::Deserialize;

use crate::{AppError, Result};

/// Shared response envelope: `{status, message, payload | data}`.
///
/// Some endpoints put the body under `payload`, others under `data`;
/// both are accepted and `payload` wins when both are present.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// `"ok"` or `"error"`.
    #[serde(default)]
    pub status: String,
    /// Human-readable message, mostly set on errors.
    #[serde(default)]
    pub message: Option<String>,
    /// Response body.
    pub payload: Option<T>,
    /// Alternate location of the response body.
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Convert the envelope into its body, mapping error envelopes to
    /// [`AppError::Api`] carrying `http_status`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Api` when `status` is `"error"`, or when it is
    /// neither `"ok"` nor `"error"` and a message is present.
    pub fn into_result(self, http_status: u16) -> Result<Option<T>> {
        match self.status.as_str() {
            "ok" => Ok(self.payload.or(self.data)),
            "error" => Err(AppError::Api {
                status: http_status,
                message: self.message.unwrap_or_default(),
            }),
            _ => match self.message {
                Some(message) if !message.is_empty() => Err(AppError::Api {
                    status: http_status,
                    message,
                }),
                _ => Ok(self.payload.or(self.data)),
            },
        }
    }
}
