//! Remote access VPN users
//!
//! Creating a user does not return its id; it is found afterwards by
//! listing the users and matching the user name.

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::{CloudError, Result};
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const ENTITY_TYPE: &str = "remoteaccessvpnuser";

const IMMUTABLE: &[&str] = &["environment_id", "username", "password"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpnUserSpec {
    pub environment_id: String,
    pub username: String,
    pub password: String,
}

impl Declare for VpnUserSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("username", &self.username)
            .with("password", &self.password)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteVpnUser {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    password: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VpnUserReconciler;

#[async_trait]
impl Reconciler for VpnUserReconciler {
    type Spec = VpnUserSpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "VPN user"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, _old: &VpnUserSpec, _new: &VpnUserSpec) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &VpnUserSpec) -> Result<Created> {
        let service = catalog.service(ENTITY_TYPE);
        let body = RemoteVpnUser {
            id: String::new(),
            username: spec.username.clone(),
            password: spec.password.clone(),
        };
        let response = service
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("adding VPN user {}", spec.username)))?;

        let users: Vec<RemoteVpnUser> = service
            .list_as(Options::new())
            .await
            .map_err(|e| e.during("listing VPN users"))?;
        let user = users
            .into_iter()
            .find(|u| u.username.eq_ignore_ascii_case(&spec.username) && !u.id.is_empty())
            .ok_or_else(|| {
                CloudError::UnexpectedResponse(format!(
                    "VPN user {} was created but is not listed",
                    spec.username
                ))
            })?;
        debug!(username = %spec.username, id = %user.id, "found created VPN user");
        Ok(Created::new(user.id).with_task(response.task()))
    }

    /// The password is write-only and is reported as declared
    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &VpnUserSpec,
    ) -> Result<Option<ObservedState<VpnUserSpec>>> {
        let user: RemoteVpnUser = catalog.service(ENTITY_TYPE).get_as(id).await?;
        let spec = VpnUserSpec {
            environment_id: declared.environment_id.clone(),
            username: user.username,
            password: declared.password.clone(),
        };
        Ok(Some(ObservedState::new(id, spec)))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &VpnUserSpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &VpnUserSpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Method};
    use crate::error::ErrorKind;
    use crate::reconciler;
    use crate::testing::{ENV, FakeApi, resource_catalog};
    use serde_json::json;

    const USER_ID: &str = "5e6f7a8b-9c0d-4e1f-a2b3-c4d5e6f7a8b9";

    fn spec() -> VpnUserSpec {
        VpnUserSpec {
            environment_id: "env-1".into(),
            username: "Ops".into(),
            password: "s3cret!".into(),
        }
    }

    #[tokio::test]
    async fn test_create_finds_id_by_listing() {
        let api = FakeApi::new();
        let endpoint = format!("{ENV}/remoteaccessvpnuser");
        // the create call answers with no data, the listing follows
        api.on(Method::Post, &endpoint, ApiResponse::ok(json!(null)));
        api.on(
            Method::Get,
            &endpoint,
            ApiResponse::ok(json!([
                {"id": "00000000-0000-0000-0000-000000000001", "username": "dev"},
                {"id": USER_ID, "username": "ops"}
            ])),
        );
        api.on(
            Method::Get,
            &format!("{endpoint}/{USER_ID}"),
            ApiResponse::ok(json!({"id": USER_ID, "username": "Ops"})),
        );
        let catalog = resource_catalog(&api);

        let result = reconciler::create(&VpnUserReconciler, &catalog, &spec()).await;
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.remote_id.as_deref(), Some(USER_ID));
        assert_eq!(result.observed.unwrap().spec, spec());
    }

    #[tokio::test]
    async fn test_create_without_listed_user_fails() {
        let api = FakeApi::new();
        let endpoint = format!("{ENV}/remoteaccessvpnuser");
        api.on(Method::Post, &endpoint, ApiResponse::ok(json!(null)));
        api.on(Method::Get, &endpoint, ApiResponse::ok(json!([])));
        let catalog = resource_catalog(&api);

        let result = reconciler::create(&VpnUserReconciler, &catalog, &spec()).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Unknown));
        assert!(result.remote_id.is_none());
    }
}
