//! Public IP addresses acquired for a VPC

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENTITY_TYPE: &str = "publicipaddresses";

const IMMUTABLE: &[&str] = &["environment_id", "vpc_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicIpSpec {
    pub environment_id: String,
    pub vpc_id: String,
}

impl Declare for PublicIpSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("vpc_id", &self.vpc_id)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

/// Public IP record, shared with static NAT
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RemotePublicIp {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub vpc_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub private_ip_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublicIpReconciler;

#[async_trait]
impl Reconciler for PublicIpReconciler {
    type Spec = PublicIpSpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Public IP"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, _old: &PublicIpSpec, _new: &PublicIpSpec) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &PublicIpSpec) -> Result<Created> {
        let body = RemotePublicIp {
            vpc_id: spec.vpc_id.clone(),
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during("acquiring public IP"))?;
        let acquired: RemotePublicIp = response.decode()?;
        info!(vpc = %spec.vpc_id, ip = %acquired.ip_address, "acquired public IP");
        Ok(Created::new(acquired.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &PublicIpSpec,
    ) -> Result<Option<ObservedState<PublicIpSpec>>> {
        let ip: RemotePublicIp = catalog.service(ENTITY_TYPE).get_as(id).await?;
        let spec = PublicIpSpec {
            environment_id: declared.environment_id.clone(),
            vpc_id: ip.vpc_id,
        };
        Ok(Some(ObservedState::new(id, spec).with_text("ip_address", &ip.ip_address)))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &PublicIpSpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &PublicIpSpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
