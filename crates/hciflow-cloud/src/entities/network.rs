//! Networks inside a VPC

use super::{non_empty, options};
use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::identifier::{Reference, project_reference, resolve_reference};
use crate::plan::{RemoteOperation, UpdateFamily};
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const ENTITY_TYPE: &str = "networks";

const DETAILS: UpdateFamily = UpdateFamily {
    name: "details",
    fields: &["name", "description"],
};
const ACL: UpdateFamily = UpdateFamily {
    name: "acl",
    fields: &["network_acl"],
};
const FAMILIES: &[UpdateFamily] = &[DETAILS, ACL];
const IMMUTABLE: &[&str] = &[
    "environment_id",
    "organization_code",
    "vpc_id",
    "network_offering",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub environment_id: String,
    /// Organization the network is created for, when not the caller's own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_code: Option<String>,
    pub name: String,
    pub description: String,
    pub vpc_id: String,
    pub network_offering: Reference,
    pub network_acl: Reference,
}

impl Declare for NetworkSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("organization_code", &self.organization_code)
            .with("name", &self.name)
            .with("description", &self.description)
            .with("vpc_id", &self.vpc_id)
            .with("network_offering", &self.network_offering)
            .with("network_acl", &self.network_acl)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteNetwork {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    vpc_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    network_offering_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    network_acl_id: String,
    #[serde(skip_serializing)]
    network_acl_name: String,
    #[serde(skip_serializing)]
    cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkOperation {
    Rename { name: String, description: String },
    ChangeAcl { acl: Reference },
}

impl RemoteOperation for NetworkOperation {
    fn family(&self) -> &'static str {
        match self {
            NetworkOperation::Rename { .. } => DETAILS.name,
            NetworkOperation::ChangeAcl { .. } => ACL.name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkReconciler;

#[async_trait]
impl Reconciler for NetworkReconciler {
    type Spec = NetworkSpec;
    type Operation = NetworkOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Network"
    }

    fn families(&self) -> &'static [UpdateFamily] {
        FAMILIES
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, old: &NetworkSpec, new: &NetworkSpec) -> Result<Vec<NetworkOperation>> {
        let (before, after) = (old.declared(), new.declared());
        let mut operations = Vec::new();
        if DETAILS.changed(&before, &after) {
            operations.push(NetworkOperation::Rename {
                name: new.name.clone(),
                description: new.description.clone(),
            });
        }
        if ACL.changed(&before, &after) {
            operations.push(NetworkOperation::ChangeAcl {
                acl: new.network_acl.clone(),
            });
        }
        Ok(operations)
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &NetworkSpec) -> Result<Created> {
        let network_offering_id =
            resolve_reference(&spec.network_offering, || catalog.network_offerings()).await?;
        let network_acl_id =
            resolve_reference(&spec.network_acl, || catalog.acls_by_vpc(&spec.vpc_id)).await?;

        let body = RemoteNetwork {
            name: spec.name.clone(),
            description: spec.description.clone(),
            vpc_id: spec.vpc_id.clone(),
            network_offering_id,
            network_acl_id,
            ..Default::default()
        };
        let create_options = match spec.organization_code.as_deref().and_then(non_empty) {
            Some(org) => options(&[("org_id", org)]),
            None => Options::new(),
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, create_options)
            .await
            .map_err(|e| e.during(format!("creating network {}", spec.name)))?;
        let created: RemoteNetwork = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &NetworkSpec,
    ) -> Result<Option<ObservedState<NetworkSpec>>> {
        let network: RemoteNetwork = catalog.service(ENTITY_TYPE).get_as(id).await?;

        let offering_name = if declared.network_offering.is_id() {
            None
        } else {
            catalog
                .network_offerings()
                .await?
                .name_of(&network.network_offering_id)
                .map(str::to_string)
        };

        let network_acl = project_reference(
            &declared.network_acl,
            &network.network_acl_id,
            &network.network_acl_name,
            || catalog.acls_by_vpc(&network.vpc_id),
        )
        .await?;

        let spec = NetworkSpec {
            environment_id: declared.environment_id.clone(),
            organization_code: declared.organization_code.clone(),
            name: network.name.clone(),
            description: network.description.clone(),
            vpc_id: network.vpc_id.clone(),
            network_offering: declared
                .network_offering
                .project(&network.network_offering_id, offering_name.as_deref()),
            network_acl,
        };
        Ok(Some(
            ObservedState::new(id, spec)
                .with_text("cidr", &network.cidr)
                .with_text("network_offering_id", &network.network_offering_id)
                .with_text("network_acl_id", &network.network_acl_id),
        ))
    }

    async fn execute(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        new: &NetworkSpec,
        operation: &NetworkOperation,
    ) -> Result<Option<TaskRef>> {
        let service = catalog.service(ENTITY_TYPE);
        let response = match operation {
            NetworkOperation::Rename { name, description } => {
                let body = RemoteNetwork {
                    id: id.to_string(),
                    name: name.clone(),
                    description: description.clone(),
                    ..Default::default()
                };
                service.update(id, serde_json::to_value(&body)?).await?
            }
            NetworkOperation::ChangeAcl { acl } => {
                let network_acl_id =
                    resolve_reference(acl, || catalog.acls_by_vpc(&new.vpc_id)).await?;
                service
                    .execute(id, "replace", Some(json!({ "networkAclId": network_acl_id })))
                    .await?
            }
        };
        Ok(response.task())
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &NetworkSpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
