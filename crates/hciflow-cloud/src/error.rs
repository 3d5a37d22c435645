//! Error taxonomy for remote calls and reconciliation

use crate::api::ApiErrorEntry;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse classification every failure maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Transient,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Error codes that mark a 4xx as a state conflict rather than bad input
const CONFLICT_MARKERS: &[&str] = &[
    "conflict",
    "already_exists",
    "in_use",
    "invalid_state",
    "busy",
];

/// Map an HTTP status and its error payload to an [`ErrorKind`].
pub fn classify(status_code: u16, errors: &[ApiErrorEntry]) -> ErrorKind {
    match status_code {
        404 => ErrorKind::NotFound,
        400 => ErrorKind::Validation,
        409 | 412 | 423 => ErrorKind::Conflict,
        401..=499 => {
            let conflict = errors.iter().any(|entry| {
                let code = entry.error_code.to_ascii_lowercase();
                CONFLICT_MARKERS.iter().any(|marker| code.contains(marker))
            });
            if conflict {
                ErrorKind::Conflict
            } else {
                ErrorKind::Validation
            }
        }
        500..=599 => ErrorKind::Transient,
        _ => ErrorKind::Unknown,
    }
}

/// A non-success response from the HCI API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiErrorResponse {
    pub status_code: u16,
    pub task_id: Option<String>,
    pub errors: Vec<ApiErrorEntry>,
}

impl ApiErrorResponse {
    pub fn kind(&self) -> ErrorKind {
        classify(self.status_code, &self.errors)
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "received HTTP status code {}", self.status_code)?;
        for entry in &self.errors {
            write!(
                f,
                "; error code: {}, message: {}",
                entry.error_code, entry.message
            )?;
            if !entry.context.is_empty() {
                write!(f, ", context: {}", serde_json::Value::Object(entry.context.clone()))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiErrorResponse {}

/// Errors raised by the resolution and reconciliation engine
#[derive(Error, Debug)]
pub enum CloudError {
    /// A name could not be resolved, or a referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    #[error("{entity} (id={id}) not found")]
    EntityNotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Api(#[from] ApiErrorResponse),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{action}: {source}")]
    Failed {
        action: String,
        #[source]
        source: Box<CloudError>,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::NotFound(_) | CloudError::EntityNotFound { .. } => ErrorKind::NotFound,
            CloudError::Validation(_) | CloudError::InvalidConfig(_) => ErrorKind::Validation,
            CloudError::Api(response) => response.kind(),
            CloudError::Transport(_) => ErrorKind::Transient,
            CloudError::Failed { source, .. } => source.kind(),
            CloudError::UnexpectedResponse(_) | CloudError::Json(_) => ErrorKind::Unknown,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Wrap the error with a description of what was being attempted.
    /// The kind of the wrapped error is preserved.
    pub fn during(self, action: impl Into<String>) -> Self {
        CloudError::Failed {
            action: action.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
