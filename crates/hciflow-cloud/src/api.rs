//! HCI API envelope types and the transport trait
//!
//! Every call carries an endpoint path, an optional JSON body and a set of
//! query options. Responses share one envelope:
//!
//! ```text
//! { "taskId": "...", "taskStatus": "...", "data": ..., "errors": [...], "metadata": {...} }
//! ```
//!
//! A status outside 200..300 is an error whether or not `errors` is populated.

use crate::error::{ApiErrorResponse, CloudError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "MC-Api-Key";

/// Query options attached to a request
pub type Options = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call against the HCI API
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub options: Options,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            options: Options::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options.extend(options);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// The `operation` option, set on execute calls
    pub fn operation(&self) -> Option<&str> {
        self.options.get("operation").map(String::as_str)
    }
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiErrorEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub error_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub context: Map<String, Value>,
}

/// Handle of an asynchronous remote task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Envelope member `key`, or `None` when absent, null or mistyped
fn member<T: DeserializeOwned>(envelope: &Map<String, Value>, key: &str) -> Option<T> {
    envelope
        .get(key)
        .filter(|value| !value.is_null())
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

fn error_entry(value: &Value) -> ApiErrorEntry {
    serde_json::from_value(value.clone()).unwrap_or_else(|_| {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        ApiErrorEntry {
            error_code: text("errorCode"),
            message: text("message"),
            context: Map::new(),
        }
    })
}

/// Decoded response envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status_code: u16,
    pub task_id: Option<String>,
    pub task_status: Option<String>,
    pub data: Option<Value>,
    pub errors: Vec<ApiErrorEntry>,
    pub metadata: Map<String, Value>,
}

impl ApiResponse {
    /// A 200 response carrying `data`
    pub fn ok(data: Value) -> Self {
        Self {
            status_code: 200,
            data: Some(data),
            ..Default::default()
        }
    }

    /// An error response with a single error entry
    pub fn error(status_code: u16, error_code: &str, message: &str) -> Self {
        Self {
            status_code,
            errors: vec![ApiErrorEntry {
                error_code: error_code.to_string(),
                message: message.to_string(),
                context: Map::new(),
            }],
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task_id: &str, status: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self.task_status = Some(status.to_string());
        self
    }

    /// Build a response from a raw HTTP status and body.
    ///
    /// Bodies that are empty or not a JSON envelope (gateway error pages)
    /// decode to an empty envelope; the status code still decides success.
    /// Members decode independently, so one malformed member loses only itself.
    pub fn from_body(status_code: u16, body: &[u8]) -> Self {
        let envelope = match serde_json::from_slice(body) {
            Ok(Value::Object(envelope)) => envelope,
            _ => Map::new(),
        };
        let errors = match envelope.get("errors") {
            Some(Value::Array(entries)) => entries.iter().map(error_entry).collect(),
            _ => Vec::new(),
        };
        Self {
            status_code,
            task_id: member(&envelope, "taskId"),
            task_status: member(&envelope, "taskStatus"),
            data: member(&envelope, "data"),
            errors,
            metadata: member(&envelope, "metadata").unwrap_or_default(),
        }
    }

    pub fn is_error(&self) -> bool {
        !(200..300).contains(&self.status_code)
    }

    /// Turn a non-success response into [`CloudError::Api`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_error() {
            Err(CloudError::Api(ApiErrorResponse {
                status_code: self.status_code,
                task_id: self.task_id,
                errors: self.errors,
            }))
        } else {
            Ok(self)
        }
    }

    pub fn task(&self) -> Option<TaskRef> {
        self.task_id.as_ref().map(|id| TaskRef {
            id: id.clone(),
            status: self.task_status.clone(),
        })
    }

    /// Decode `data` into a typed record
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match &self.data {
            Some(data) => Ok(serde_json::from_value(data.clone())?),
            None => Err(CloudError::UnexpectedResponse(
                "response carried no data".to_string(),
            )),
        }
    }

    /// Decode `data` into a list; a missing `data` is an empty list
    pub fn decode_list<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        match &self.data {
            Some(data) => Ok(serde_json::from_value(data.clone())?),
            None => Ok(Vec::new()),
        }
    }
}

/// Transport seam between the engine and the HCI API
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Perform one call. Non-success statuses are returned as responses,
    /// not errors; only transport failures are `Err`.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}
