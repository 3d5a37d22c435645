//! Endpoint-scoped access to one entity type

use crate::api::{ApiClient, ApiRequest, ApiResponse, Method, Options};
use crate::context::EnvironmentContext;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Issues get/list/create/update/execute/delete calls for a single entity
/// type, either inside an environment or against the configuration API.
#[derive(Clone)]
pub struct EntityService {
    client: Arc<dyn ApiClient>,
    endpoint: String,
}

impl EntityService {
    /// `services/{serviceCode}/{environmentName}/{entityType}`
    pub fn scoped(
        client: Arc<dyn ApiClient>,
        context: &EnvironmentContext,
        entity_type: &str,
    ) -> Self {
        Self {
            client,
            endpoint: format!(
                "services/{}/{}/{}",
                context.service_code, context.environment_name, entity_type
            ),
        }
    }

    /// Configuration endpoints (`environments`, `organizations`, ...)
    pub fn configuration(client: Arc<dyn ApiClient>, entity_type: &str) -> Self {
        Self {
            client,
            endpoint: entity_type.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn item(&self, id: &str) -> String {
        format!("{}/{}", self.endpoint, id)
    }

    pub async fn get(&self, id: &str) -> Result<ApiResponse> {
        self.call(ApiRequest::new(Method::Get, self.item(id))).await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        self.get(id).await?.decode()
    }

    pub async fn list(&self, options: Options) -> Result<ApiResponse> {
        self.call(ApiRequest::new(Method::Get, self.endpoint.clone()).with_options(options))
            .await
    }

    pub async fn list_as<T: DeserializeOwned>(&self, options: Options) -> Result<Vec<T>> {
        self.list(options).await?.decode_list()
    }

    pub async fn create(&self, body: Value, options: Options) -> Result<ApiResponse> {
        self.call(
            ApiRequest::new(Method::Post, self.endpoint.clone())
                .with_body(body)
                .with_options(options),
        )
        .await
    }

    pub async fn update(&self, id: &str, body: Value) -> Result<ApiResponse> {
        self.call(ApiRequest::new(Method::Put, self.item(id)).with_body(body))
            .await
    }

    /// `POST {endpoint}/{id}?operation={operation}`
    pub async fn execute(
        &self,
        id: &str,
        operation: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse> {
        let mut request =
            ApiRequest::new(Method::Post, self.item(id)).with_option("operation", operation);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        self.call(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<ApiResponse> {
        self.call(ApiRequest::new(Method::Delete, self.item(id))).await
    }

    async fn call(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            operation = request.operation().unwrap_or(""),
            "HCI API call"
        );
        self.client.send(request).await?.into_result()
    }
}
