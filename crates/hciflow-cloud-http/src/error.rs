//! HTTP transport error types

use hciflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid API key: not a valid header value")]
    InvalidApiKey,

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HttpError>;

/// Transport failures reach the engine as [`CloudError::Transport`]
impl From<HttpError> for CloudError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::InvalidUrl { .. } | HttpError::InvalidApiKey => {
                CloudError::InvalidConfig(e.to_string())
            }
            HttpError::Client(_) => CloudError::Transport(e.to_string()),
        }
    }
}
