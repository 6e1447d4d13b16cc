//! Error normalization and user-facing notifications.
//!
//! Every failure that reaches the user is first classified into an
//! [`ApiError`] (status, machine-readable code, message, and any per-field
//! validation errors). [`handle_error`] then resolves the message to show
//! and hands it to a [`Notifier`], the display sink passed in by the caller.
//!
//! # Error Contract
//!
//! With `--format json`, failures are printed as an [`ErrorResponse`]:
//!
//! ```json
//! {
//!   "statusCode": 502,
//!   "status": "error",
//!   "code": "embedding_provider",
//!   "message": "embedding provider error: OpenAI API error 401 ...",
//!   "timestamp": "2024-01-02T03:04:05+00:00"
//! }
//! ```
//!
//! | Code | Status | Cause |
//! |------|--------|-------|
//! | `bad_request` | 400 | invalid threshold or request fields |
//! | `embedding_provider` | 502 | the embedding backend failed |
//! | `embedding_shape` | 502 | the backend returned unusable vectors |
//! | `internal` | 500 | anything else |

use anyhow::Result;
use chrono::{DateTime, Utc};
use question_clusters_core::ClusterError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

/// A single invalid input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A classified, user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<FieldError>,
}

impl ApiError {
    fn new(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            validation_errors: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "bad_request", message)
    }

    /// A 400 carrying per-field errors.
    pub fn validation(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            validation_errors: errors,
            ..Self::bad_request(message)
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "internal", message)
    }

    /// Classify an arbitrary error by looking for the typed errors this
    /// crate produces anywhere in its chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        if let Some(api) = err.downcast_ref::<ApiError>() {
            return api.clone();
        }
        for cause in err.chain() {
            if let Some(cluster) = cause.downcast_ref::<ClusterError>() {
                return Self::from(cluster);
            }
        }
        Self::internal(format!("{:#}", err))
    }
}

impl From<&ClusterError> for ApiError {
    fn from(err: &ClusterError) -> Self {
        let message = match err {
            ClusterError::EmbeddingProvider(inner) => {
                format!("embedding provider error: {:#}", inner)
            }
            other => other.to_string(),
        };
        match err {
            ClusterError::EmbeddingProvider(_) => Self::new(502, "embedding_provider", message),
            ClusterError::EmbeddingShape(_) => Self::new(502, "embedding_shape", message),
            ClusterError::InvalidThreshold(_) => Self::validation(
                message,
                vec![FieldError::new("threshold", "must be a finite number")],
            ),
            ClusterError::MaxGroupsTooLarge { limit, .. } => Self::validation(
                message,
                vec![FieldError::new("max_groups", format!("must be <= {}", limit))],
            ),
        }
    }
}

/// Pull the per-field errors out of a classified error.
pub fn extract_errors(err: &ApiError) -> &[FieldError] {
    &err.validation_errors
}

/// JSON body printed for a failed run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status_code: u16,
    pub status: &'static str,
    pub code: String,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl ErrorResponse {
    pub fn at(err: &ApiError, timestamp: DateTime<Utc>) -> Self {
        Self {
            status_code: err.status,
            status: "error",
            code: err.code.clone(),
            message: err.message.clone(),
            timestamp: timestamp.to_rfc3339(),
            errors: err.validation_errors.clone(),
        }
    }
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        Self::at(err, Utc::now())
    }
}

// ============ Notification sink ============

/// Where user-facing messages go.
///
/// Delivery may fail; callers log the failure and carry on.
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str) -> Result<()>;
    fn show_success(&self, message: &str) -> Result<()>;
}

/// Writes notifications to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn show_error(&self, message: &str) -> Result<()> {
        writeln!(std::io::stderr(), "Error: {}", message)?;
        Ok(())
    }

    fn show_success(&self, message: &str) -> Result<()> {
        writeln!(std::io::stderr(), "{}", message)?;
        Ok(())
    }
}

/// One delivered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error(String),
    Success(String),
}

/// Keeps notifications in memory; used by tests and embedders that render
/// messages themselves.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn push(&self, event: Notification) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("notification log poisoned"))?
            .push(event);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, message: &str) -> Result<()> {
        self.push(Notification::Error(message.to_string()))
    }

    fn show_success(&self, message: &str) -> Result<()> {
        self.push(Notification::Success(message.to_string()))
    }
}

/// Resolve the message for `err` and show it unless `silent`.
///
/// Falls back to `default_message` when the error carries no message.
/// Returns the resolved message either way.
pub fn handle_error(
    notifier: &dyn Notifier,
    err: &ApiError,
    default_message: &str,
    silent: bool,
) -> String {
    let message = if err.message.trim().is_empty() {
        default_message.to_string()
    } else {
        err.message.clone()
    };

    tracing::debug!(code = %err.code, status = err.status, "reporting error");

    if !silent {
        if let Err(e) = notifier.show_error(&message) {
            tracing::error!(error = %e, "failed to show error notification");
        }
    }

    message
}

/// Show a success message.
pub fn handle_success(notifier: &dyn Notifier, message: &str) {
    if let Err(e) = notifier.show_success(message) {
        tracing::error!(error = %e, "failed to show success notification");
    }
}
