//! VPCs

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::identifier::{Reference, project_reference, resolve_reference};
use crate::plan::{RemoteOperation, UpdateFamily};
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

pub const ENTITY_TYPE: &str = "vpcs";

const DETAILS: UpdateFamily = UpdateFamily {
    name: "details",
    fields: &["name", "description"],
};
const FAMILIES: &[UpdateFamily] = &[DETAILS];
const IMMUTABLE: &[&str] = &["environment_id", "vpc_offering", "network_domain", "zone"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VpcSpec {
    pub environment_id: String,
    pub name: String,
    pub description: String,
    pub vpc_offering: Reference,
    /// Custom DNS suffix; assigned by the platform when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Reference>,
}

impl Declare for VpcSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("name", &self.name)
            .with("description", &self.description)
            .with("vpc_offering", &self.vpc_offering)
            .with("network_domain", &self.network_domain)
            .with("zone", &self.zone)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteVpc {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    vpc_offering_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    network_domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    zone_id: String,
    #[serde(skip_serializing)]
    zone_name: String,
    #[serde(skip_serializing)]
    cidr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VpcOperation {
    Rename { name: String, description: String },
}

impl RemoteOperation for VpcOperation {
    fn family(&self) -> &'static str {
        DETAILS.name
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VpcReconciler;

#[async_trait]
impl Reconciler for VpcReconciler {
    type Spec = VpcSpec;
    type Operation = VpcOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "VPC"
    }

    fn families(&self) -> &'static [UpdateFamily] {
        FAMILIES
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, old: &VpcSpec, new: &VpcSpec) -> Result<Vec<VpcOperation>> {
        if DETAILS.changed(&old.declared(), &new.declared()) {
            Ok(vec![VpcOperation::Rename {
                name: new.name.clone(),
                description: new.description.clone(),
            }])
        } else {
            Ok(Vec::new())
        }
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &VpcSpec) -> Result<Created> {
        let vpc_offering_id =
            resolve_reference(&spec.vpc_offering, || catalog.vpc_offerings()).await?;
        let zone_id = match &spec.zone {
            Some(zone) => resolve_reference(zone, || catalog.zones()).await?,
            None => String::new(),
        };

        let body = RemoteVpc {
            name: spec.name.clone(),
            description: spec.description.clone(),
            vpc_offering_id,
            network_domain: spec.network_domain.clone().unwrap_or_default(),
            zone_id,
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("creating VPC {}", spec.name)))?;
        let created: RemoteVpc = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &VpcSpec,
    ) -> Result<Option<ObservedState<VpcSpec>>> {
        let vpc: RemoteVpc = catalog.service(ENTITY_TYPE).get_as(id).await?;

        let offering_name = if declared.vpc_offering.is_id() {
            None
        } else {
            catalog
                .vpc_offerings()
                .await?
                .name_of(&vpc.vpc_offering_id)
                .map(str::to_string)
        };
        let zone = match &declared.zone {
            Some(zone) => {
                let zones = || catalog.zones();
                Some(project_reference(zone, &vpc.zone_id, &vpc.zone_name, zones).await?)
            }
            None => None,
        };

        let spec = VpcSpec {
            environment_id: declared.environment_id.clone(),
            name: vpc.name.clone(),
            description: vpc.description.clone(),
            vpc_offering: declared
                .vpc_offering
                .project(&vpc.vpc_offering_id, offering_name.as_deref()),
            network_domain: declared
                .network_domain
                .as_ref()
                .map(|_| vpc.network_domain.clone()),
            zone,
        };
        Ok(Some(
            ObservedState::new(id, spec)
                .with_text("vpc_offering_id", &vpc.vpc_offering_id)
                .with_text("network_domain", &vpc.network_domain)
                .with_text("zone_id", &vpc.zone_id)
                .with_text("zone_name", &vpc.zone_name)
                .with_text("cidr", &vpc.cidr),
        ))
    }

    async fn execute(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _new: &VpcSpec,
        operation: &VpcOperation,
    ) -> Result<Option<TaskRef>> {
        let VpcOperation::Rename { name, description } = operation;
        let body = RemoteVpc {
            id: id.to_string(),
            name: name.clone(),
            description: description.clone(),
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .update(id, serde_json::to_value(&body)?)
            .await?;
        Ok(response.task())
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &VpcSpec,
    ) -> Result<Option<TaskRef>> {
        info!(vpc = %declared.name, id, "destroying VPC");
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
