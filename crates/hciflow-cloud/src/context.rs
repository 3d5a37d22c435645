//! Environment context shared by all environment-scoped entities

use crate::api::ApiClient;
use crate::entities::environment::RemoteEnvironment;
use crate::error::{CloudError, Result};
use crate::service::EntityService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Identifies where an environment lives. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvironmentContext {
    pub organization_id: String,
    pub service_code: String,
    pub environment_id: String,
    pub environment_name: String,
}

impl EnvironmentContext {
    pub fn new(
        organization_id: impl Into<String>,
        service_code: impl Into<String>,
        environment_id: impl Into<String>,
        environment_name: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            service_code: service_code.into(),
            environment_id: environment_id.into(),
            environment_name: environment_name.into(),
        }
    }

    /// Read `environments/{id}` and derive the context from it
    pub async fn load(client: Arc<dyn ApiClient>, environment_id: &str) -> Result<Self> {
        let environment: RemoteEnvironment = EntityService::configuration(client, "environments")
            .get_as(environment_id)
            .await
            .map_err(|e| e.during(format!("loading environment {environment_id}")))?;

        if environment.service_connection.service_code.is_empty() {
            return Err(CloudError::UnexpectedResponse(format!(
                "environment {environment_id} has no service connection"
            )));
        }

        debug!(
            environment = %environment.name,
            service = %environment.service_connection.service_code,
            "loaded environment context"
        );
        Ok(Self {
            organization_id: environment.organization.id,
            service_code: environment.service_connection.service_code,
            environment_id: environment.id,
            environment_name: environment.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Method};
    use crate::testing::FakeApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_from_environment_record() {
        let api = FakeApi::new();
        api.on(
            Method::Get,
            "environments/env-1",
            ApiResponse::ok(json!({
                "id": "env-1",
                "name": "dev",
                "organization": {"id": "org-1", "entryPoint": "acme"},
                "serviceConnection": {"id": "sc-1", "serviceCode": "compute-on"}
            })),
        );

        let context = EnvironmentContext::load(api.clone(), "env-1").await.unwrap();
        assert_eq!(context, EnvironmentContext::new("org-1", "compute-on", "env-1", "dev"));
    }

    #[tokio::test]
    async fn test_load_missing_environment_is_not_found() {
        let api = FakeApi::new();
        let err = EnvironmentContext::load(api.clone(), "env-x").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("loading environment env-x"));
    }
}
