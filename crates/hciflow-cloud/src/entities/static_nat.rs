//! Static NAT between a public IP and a private IP
//!
//! Static NAT has no record of its own: it lives on the public IP, whose id
//! doubles as the NAT id. A public IP without a private IP has no NAT.

use super::public_ip::{self, RemotePublicIp};
use crate::api::TaskRef;
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const IMMUTABLE: &[&str] = &["environment_id", "public_ip_id", "private_ip_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticNatSpec {
    pub environment_id: String,
    pub public_ip_id: String,
    pub private_ip_id: String,
}

impl Declare for StaticNatSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("public_ip_id", &self.public_ip_id)
            .with("private_ip_id", &self.private_ip_id)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StaticNatReconciler;

#[async_trait]
impl Reconciler for StaticNatReconciler {
    type Spec = StaticNatSpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Static NAT"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, _old: &StaticNatSpec, _new: &StaticNatSpec) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &StaticNatSpec) -> Result<Created> {
        let response = catalog
            .service(public_ip::ENTITY_TYPE)
            .execute(
                &spec.public_ip_id,
                "enableStaticNat",
                Some(json!({ "privateIpId": spec.private_ip_id })),
            )
            .await
            .map_err(|e| e.during("enabling static NAT"))?;
        Ok(Created::new(spec.public_ip_id.clone()).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &StaticNatSpec,
    ) -> Result<Option<ObservedState<StaticNatSpec>>> {
        let ip: RemotePublicIp = catalog.service(public_ip::ENTITY_TYPE).get_as(id).await?;
        if ip.private_ip_id.is_empty() {
            debug!(public_ip = id, "static NAT no longer enabled");
            return Ok(None);
        }
        let spec = StaticNatSpec {
            environment_id: declared.environment_id.clone(),
            public_ip_id: id.to_string(),
            private_ip_id: ip.private_ip_id,
        };
        Ok(Some(ObservedState::new(id, spec).with_text("ip_address", &ip.ip_address)))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &StaticNatSpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &StaticNatSpec,
    ) -> Result<Option<TaskRef>> {
        let response = catalog
            .service(public_ip::ENTITY_TYPE)
            .execute(id, "disableStaticNat", None)
            .await?;
        Ok(response.task())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Method};
    use crate::reconciler::{self, ReadMode};
    use crate::testing::{ENV, FakeApi, resource_catalog};

    const IP_ID: &str = "8b9c0d1e-2f3a-4b4c-9d5e-6f7a8b9c0d1e";
    const PRIVATE_IP_ID: &str = "1e2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b";

    fn spec() -> StaticNatSpec {
        StaticNatSpec {
            environment_id: "env-1".into(),
            public_ip_id: IP_ID.into(),
            private_ip_id: PRIVATE_IP_ID.into(),
        }
    }

    #[tokio::test]
    async fn test_enable_uses_public_ip_as_id() {
        let api = FakeApi::new();
        api.on(
            Method::Post,
            &format!("{ENV}/publicipaddresses/{IP_ID}?operation=enableStaticNat"),
            ApiResponse::ok(json!({})),
        );
        api.on(
            Method::Get,
            &format!("{ENV}/publicipaddresses/{IP_ID}"),
            ApiResponse::ok(json!({"id": IP_ID, "privateIpId": PRIVATE_IP_ID})),
        );
        let catalog = resource_catalog(&api);

        let result = reconciler::create(&StaticNatReconciler, &catalog, &spec()).await;
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.remote_id.as_deref(), Some(IP_ID));
        assert_eq!(result.observed.unwrap().spec, spec());
        assert_eq!(api.requests()[0].body, Some(json!({"privateIpId": PRIVATE_IP_ID})));
    }

    #[tokio::test]
    async fn test_public_ip_without_private_ip_is_absent() {
        let api = FakeApi::new();
        api.on(
            Method::Get,
            &format!("{ENV}/publicipaddresses/{IP_ID}"),
            ApiResponse::ok(json!({"id": IP_ID, "privateIpId": ""})),
        );
        let catalog = resource_catalog(&api);

        let nat = StaticNatReconciler;
        let tolerant = reconciler::read(&nat, &catalog, IP_ID, &spec(), ReadMode::Tolerant).await;
        assert!(tolerant.unwrap().is_none());

        let expecting =
            reconciler::read(&nat, &catalog, IP_ID, &spec(), ReadMode::ExpectingPresence).await;
        assert_eq!(
            expecting.unwrap_err().to_string(),
            format!("Static NAT (id={IP_ID}) not found")
        );
    }

    #[tokio::test]
    async fn test_disable_on_delete() {
        let api = FakeApi::new();
        api.on(
            Method::Post,
            &format!("{ENV}/publicipaddresses/{IP_ID}?operation=disableStaticNat"),
            ApiResponse::ok(json!({})),
        );
        let catalog = resource_catalog(&api);

        let result = reconciler::delete(&StaticNatReconciler, &catalog, IP_ID, &spec()).await;
        assert!(result.is_success());
        assert_eq!(api.requests()[0].operation(), Some("disableStaticNat"));
    }
}
