//! HTTP transport for the HCIFlow cloud engine
//!
//! Implements [`hciflow_cloud::ApiClient`] on top of reqwest. Every request
//! carries the `MC-Api-Key` header and a JSON content type; responses are
//! handed back undecoded so the engine can classify failures itself.
//!
//! # Example
//!
//! ```ignore
//! use hciflow_cloud::{Engine, EngineOptions};
//! use hciflow_cloud_http::{HttpApiClient, HttpClientConfig};
//! use std::sync::Arc;
//!
//! let client = HttpApiClient::new(HttpClientConfig::new(api_key))?;
//! let engine = Engine::new(Arc::new(client), EngineOptions::default());
//! ```

pub mod client;
pub mod error;

pub use client::{DEFAULT_API_URL, HttpApiClient, HttpClientConfig};
pub use error::{HttpError, Result};
