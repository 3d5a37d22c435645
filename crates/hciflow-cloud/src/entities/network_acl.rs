//! Network ACLs of a VPC

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ENTITY_TYPE: &str = "networkacls";

const IMMUTABLE: &[&str] = &["environment_id", "name", "description", "vpc_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAclSpec {
    pub environment_id: String,
    pub name: String,
    pub description: String,
    pub vpc_id: String,
}

impl Declare for NetworkAclSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("name", &self.name)
            .with("description", &self.description)
            .with("vpc_id", &self.vpc_id)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteNetworkAcl {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    description: String,
    vpc_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkAclReconciler;

#[async_trait]
impl Reconciler for NetworkAclReconciler {
    type Spec = NetworkAclSpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Network ACL"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, _old: &NetworkAclSpec, _new: &NetworkAclSpec) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &NetworkAclSpec) -> Result<Created> {
        let body = RemoteNetworkAcl {
            id: String::new(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            vpc_id: spec.vpc_id.clone(),
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("creating network ACL {}", spec.name)))?;
        let created: RemoteNetworkAcl = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &NetworkAclSpec,
    ) -> Result<Option<ObservedState<NetworkAclSpec>>> {
        let acl: RemoteNetworkAcl = catalog.service(ENTITY_TYPE).get_as(id).await?;
        let spec = NetworkAclSpec {
            environment_id: declared.environment_id.clone(),
            name: acl.name,
            description: acl.description,
            vpc_id: acl.vpc_id,
        };
        Ok(Some(ObservedState::new(id, spec)))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &NetworkAclSpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &NetworkAclSpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
