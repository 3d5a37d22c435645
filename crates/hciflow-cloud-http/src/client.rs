//! reqwest-backed [`ApiClient`]

use crate::error::{HttpError, Result};
use async_trait::async_trait;
use hciflow_cloud::{ApiClient, ApiRequest, ApiResponse, Method, Options};
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://hypertec.cloud/api/v1/";

/// Connection settings of the HCI API
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub api_url: String,
    pub api_key: String,
    /// Accept invalid TLS certificates
    pub insecure: bool,
    pub timeout: Option<Duration>,
}

impl HttpClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            insecure: false,
            timeout: None,
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.api_url)?;

        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| HttpError::InvalidApiKey)?;
        // MC-Api-Key
        headers.insert(HeaderName::from_static("mc-api-key"), api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if config.insecure {
            warn!(url = %base_url, "TLS certificate verification is disabled");
        }
        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL of `endpoint`, with `options` as query parameters
    pub fn url_for(&self, endpoint: &str, options: &Options) -> Result<Url> {
        let mut url = self
            .base_url
            .join(endpoint.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidUrl {
                url: format!("{}{endpoint}", self.base_url),
                reason: e.to_string(),
            })?;
        if !options.is_empty() {
            url.query_pairs_mut().extend_pairs(options);
        }
        Ok(url)
    }
}

/// The base URL must end with `/` for endpoints to be joined below it
fn parse_base_url(api_url: &str) -> Result<Url> {
    let normalized = if api_url.ends_with('/') {
        api_url.to_string()
    } else {
        format!("{api_url}/")
    };
    let url = Url::parse(&normalized).map_err(|e| HttpError::InvalidUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(HttpError::InvalidUrl {
            url: api_url.to_string(),
            reason: "not a base URL".to_string(),
        });
    }
    Ok(url)
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, request: ApiRequest) -> hciflow_cloud::Result<ApiResponse> {
        let url = self.url_for(&request.endpoint, &request.options)?;
        debug!(method = %request.method, %url, "HCI API request");

        let mut builder = self.client.request(http_method(request.method), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(HttpError::from)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(HttpError::from)?;

        debug!(status, bytes = body.len(), "HCI API response");
        Ok(ApiResponse::from_body(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> HttpApiClient {
        HttpApiClient::new(HttpClientConfig::new("secret").with_api_url(api_url)).unwrap()
    }

    #[test]
    fn test_default_url() {
        let client = HttpApiClient::new(HttpClientConfig::new("secret")).unwrap();
        assert_eq!(client.base_url().as_str(), DEFAULT_API_URL);
    }

    #[test]
    fn test_endpoint_joins_below_base() {
        let client = client("https://api.example.com/api/v1");
        let url = client
            .url_for("services/compute-on/dev/volumes/vol-1", &Options::new())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/services/compute-on/dev/volumes/vol-1"
        );
    }

    #[test]
    fn test_options_become_query() {
        let client = client("https://api.example.com/api/v1/");
        let options = Options::from([
            ("operation".to_string(), "resize".to_string()),
            ("org_id".to_string(), "acme corp".to_string()),
        ]);
        let url = client.url_for("/volumes/vol-1", &options).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/volumes/vol-1?operation=resize&org_id=acme+corp"
        );
    }

    #[test]
    fn test_invalid_configuration() {
        let config = HttpClientConfig::new("secret").with_api_url("not a url");
        let err = HttpApiClient::new(config).err();
        assert!(matches!(err, Some(HttpError::InvalidUrl { .. })));

        let err = HttpApiClient::new(HttpClientConfig::new("bad\nkey")).err();
        assert!(matches!(err, Some(HttpError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let mut config = HttpClientConfig::new("secret").with_api_url("http://127.0.0.1:9/api/");
        config.timeout = Some(Duration::from_secs(2));
        let client = HttpApiClient::new(config).unwrap();

        let err = client
            .send(ApiRequest::new(Method::Get, "organizations"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), hciflow_cloud::ErrorKind::Transient);
    }
}
