//! Bare-metal servers
//!
//! Created through the `acquireBareMetal` operation and destroyed through
//! `releaseBareMetal`. Only the SSH key can change in place; the private IP
//! is fixed once assigned.

use super::{non_empty, options};
use crate::api::TaskRef;
use crate::catalog::ResourceCatalog;
use crate::error::{CloudError, Result};
use crate::identifier::{Reference, project_reference, resolve_reference};
use crate::plan::{RemoteOperation, UpdateFamily};
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

pub const ENTITY_TYPE: &str = "baremetals";
const HYPERVISOR: &str = "Baremetal";

const SSH_KEY: UpdateFamily = UpdateFamily {
    name: "ssh_key",
    fields: &["ssh_key_name"],
};
const FAMILIES: &[UpdateFamily] = &[SSH_KEY];
const IMMUTABLE: &[&str] = &["environment_id", "template", "network_id", "dedicated_group_id"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaremetalSpec {
    pub environment_id: String,
    pub name: String,
    pub template: Reference,
    pub compute_offering: Reference,
    pub network_id: String,
    /// Always sent as `Baremetal`
    #[serde(default = "default_hypervisor")]
    pub hypervisor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_group_id: Option<String>,
}

fn default_hypervisor() -> String {
    HYPERVISOR.to_string()
}

impl Declare for BaremetalSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("name", &self.name)
            .with("template", &self.template)
            .with("compute_offering", &self.compute_offering)
            .with("network_id", &self.network_id)
            .with("hypervisor", &self.hypervisor)
            .with("ssh_key_name", &self.ssh_key_name)
            .with("public_key", &self.public_key)
            .with("user_data", &self.user_data)
            .with("private_ip", &self.private_ip)
            .with("dedicated_group_id", &self.dedicated_group_id)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteBaremetal {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    template_id: String,
    /// Mirrors `templateId`; the acquire operation reads the image from here
    #[serde(skip_serializing_if = "String::is_empty")]
    image_id: String,
    #[serde(skip_serializing)]
    template_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    compute_offering_id: String,
    #[serde(skip_serializing)]
    compute_offering_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    network_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    hypervisor: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    ssh_key_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    public_key: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    user_data: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    ip_address: String,
    #[serde(skip_serializing)]
    ip_address_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    dedicated_group_id: String,
    #[serde(skip_serializing)]
    affinity_group_ids: Vec<String>,
    #[serde(skip_serializing)]
    username: String,
    #[serde(skip_serializing)]
    password: String,
    #[serde(skip_serializing)]
    state: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaremetalOperation {
    AssociateSshKey { ssh_key_name: String },
}

impl RemoteOperation for BaremetalOperation {
    fn family(&self) -> &'static str {
        SSH_KEY.name
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BaremetalReconciler;

#[async_trait]
impl Reconciler for BaremetalReconciler {
    type Spec = BaremetalSpec;
    type Operation = BaremetalOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Baremetal"
    }

    fn families(&self) -> &'static [UpdateFamily] {
        FAMILIES
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, old: &BaremetalSpec, new: &BaremetalSpec) -> Result<Vec<BaremetalOperation>> {
        let (before, after) = (old.declared(), new.declared());
        if before.differs(&after, "private_ip") {
            return Err(CloudError::Validation(
                "Cannot update the private IP of a baremetal".to_string(),
            ));
        }
        if !SSH_KEY.changed(&before, &after) {
            return Ok(Vec::new());
        }
        match new.ssh_key_name.as_deref().and_then(non_empty) {
            Some(ssh_key_name) => Ok(vec![BaremetalOperation::AssociateSshKey {
                ssh_key_name: ssh_key_name.to_string(),
            }]),
            None => Err(CloudError::Validation(
                "Cannot remove the SSH key of a baremetal".to_string(),
            )),
        }
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &BaremetalSpec) -> Result<Created> {
        let compute_offering_id =
            resolve_reference(&spec.compute_offering, || catalog.compute_offerings()).await?;
        let template_id = resolve_reference(&spec.template, || catalog.templates()).await?;

        let body = RemoteBaremetal {
            name: spec.name.clone(),
            image_id: template_id.clone(),
            template_id,
            compute_offering_id,
            network_id: spec.network_id.clone(),
            hypervisor: HYPERVISOR.to_string(),
            ssh_key_name: spec.ssh_key_name.clone().unwrap_or_default(),
            public_key: spec.public_key.clone().unwrap_or_default(),
            user_data: spec.user_data.clone().unwrap_or_default(),
            ip_address: spec.private_ip.clone().unwrap_or_default(),
            dedicated_group_id: spec.dedicated_group_id.clone().unwrap_or_default(),
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(
                serde_json::to_value(&body)?,
                options(&[("operation", "acquireBareMetal")]),
            )
            .await
            .map_err(|e| e.during(format!("creating baremetal {}", spec.name)))?;
        let created: RemoteBaremetal = response.decode()?;

        let mut result = Created::new(created.id).with_task(response.task());
        for (key, value) in [
            ("host", &created.ip_address),
            ("user", &created.username),
            ("password", &created.password),
        ] {
            if !value.is_empty() {
                result = result.with_computed(key, value.as_str());
            }
        }
        Ok(result)
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &BaremetalSpec,
    ) -> Result<Option<ObservedState<BaremetalSpec>>> {
        let baremetal: RemoteBaremetal = catalog.service(ENTITY_TYPE).get_as(id).await?;

        let dedicated_group = if baremetal.affinity_group_ids.is_empty() {
            None
        } else {
            let groups = catalog.dedicated_groups().await?;
            groups
                .entries()
                .iter()
                .find(|group| {
                    baremetal
                        .affinity_group_ids
                        .iter()
                        .any(|id| id.eq_ignore_ascii_case(&group.id))
                })
                .map(|group| group.id.clone())
        };

        let template = project_reference(
            &declared.template,
            &baremetal.template_id,
            &baremetal.template_name,
            || catalog.templates(),
        )
        .await?;
        let compute_offering = project_reference(
            &declared.compute_offering,
            &baremetal.compute_offering_id,
            &baremetal.compute_offering_name,
            || catalog.compute_offerings(),
        )
        .await?;

        let spec = BaremetalSpec {
            environment_id: declared.environment_id.clone(),
            name: baremetal.name.clone(),
            template,
            compute_offering,
            network_id: baremetal.network_id.clone(),
            hypervisor: declared.hypervisor.clone(),
            ssh_key_name: declared
                .ssh_key_name
                .as_ref()
                .map(|_| baremetal.ssh_key_name.clone()),
            public_key: declared.public_key.clone(),
            user_data: declared.user_data.clone(),
            private_ip: declared
                .private_ip
                .as_ref()
                .map(|_| baremetal.ip_address.clone()),
            dedicated_group_id: declared
                .dedicated_group_id
                .as_ref()
                .and(dedicated_group.clone()),
        };
        Ok(Some(
            ObservedState::new(id, spec)
                .with_text("dedicated_group_id", dedicated_group.as_deref().unwrap_or_default())
                .with_text("private_ip", &baremetal.ip_address)
                .with_text("private_ip_id", &baremetal.ip_address_id)
                .with_text("state", &baremetal.state),
        ))
    }

    async fn execute(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _new: &BaremetalSpec,
        operation: &BaremetalOperation,
    ) -> Result<Option<TaskRef>> {
        let BaremetalOperation::AssociateSshKey { ssh_key_name } = operation;
        info!(baremetal = id, ssh_key = %ssh_key_name, "associating SSH key");
        let response = catalog
            .service(ENTITY_TYPE)
            .execute(id, "associateSSHKey", Some(json!({ "sshKeyName": ssh_key_name })))
            .await?;
        Ok(response.task())
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &BaremetalSpec,
    ) -> Result<Option<TaskRef>> {
        info!(baremetal = %declared.name, id, "destroying baremetal");
        let response = catalog
            .service(ENTITY_TYPE)
            .execute(id, "releaseBareMetal", None)
            .await?;
        Ok(response.task())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiResponse, Method};
    use crate::reconciler;
    use crate::plan::changed_families;
    use crate::testing::{ENV, FakeApi, resource_catalog};

    const BAREMETAL_ID: &str = "b1b2b3b4-c5c6-4d7d-8e8e-f9f9f9f9f9f9";
    const TEMPLATE_ID: &str = "7e7e7e7e-6d6d-4c5c-4b4b-3a3a3a3a3a3a";
    const OFFERING_ID: &str = "2b2b2b2b-3c3c-4d4d-5e5e-6f6f6f6f6f6f";
    const GROUP_ID: &str = "d3d3d3d3-e4e4-4f5f-a6a6-b7b7b7b7b7b7";

    fn spec() -> BaremetalSpec {
        BaremetalSpec {
            environment_id: "env-1".into(),
            name: "db-1".into(),
            template: Reference::parse("Ubuntu 22.04"),
            compute_offering: Reference::parse(OFFERING_ID),
            network_id: "net-1".into(),
            hypervisor: default_hypervisor(),
            ..Default::default()
        }
    }

    #[test]
    fn test_private_ip_change_is_rejected() {
        let old = BaremetalSpec {
            private_ip: Some("10.0.0.5".into()),
            ssh_key_name: Some("old".into()),
            ..spec()
        };
        let new = BaremetalSpec {
            private_ip: Some("10.0.0.6".into()),
            ssh_key_name: Some("new".into()),
            ..spec()
        };
        let err = BaremetalReconciler.plan(&old, &new).unwrap_err();
        assert_eq!(err.to_string(), "Cannot update the private IP of a baremetal");
    }

    #[test]
    fn test_ssh_key_change_plans_association() {
        let new = BaremetalSpec {
            ssh_key_name: Some("deploy".into()),
            ..spec()
        };
        assert_eq!(
            BaremetalReconciler.plan(&spec(), &new).unwrap(),
            vec![BaremetalOperation::AssociateSshKey {
                ssh_key_name: "deploy".into()
            }]
        );
    }

    #[test]
    fn test_ssh_key_removal_is_rejected() {
        let old = BaremetalSpec {
            ssh_key_name: Some("deploy".into()),
            ..spec()
        };
        for new in [
            BaremetalSpec {
                ssh_key_name: Some(String::new()),
                ..spec()
            },
            spec(),
        ] {
            let err = BaremetalReconciler.plan(&old, &new).unwrap_err();
            assert_eq!(err.to_string(), "Cannot remove the SSH key of a baremetal");
        }
    }

    #[test]
    fn test_planned_families_match_changed_fields() {
        let old = BaremetalSpec {
            ssh_key_name: Some("old".into()),
            ..spec()
        };
        let new = BaremetalSpec {
            ssh_key_name: Some("new".into()),
            ..spec()
        };
        let plan = BaremetalReconciler.plan(&old, &new).unwrap();
        let changed: Vec<_> = changed_families(&old.declared(), &new.declared(), FAMILIES)
            .into_iter()
            .map(|family| family.name)
            .collect();
        assert_eq!(
            reconciler::planned_families(&BaremetalReconciler, &old, &new, &plan),
            changed
        );
        assert!(BaremetalReconciler.plan(&old, &old.clone()).unwrap().is_empty());
    }

    /// An SSH key the manifest does not declare is not compared
    #[tokio::test]
    async fn test_undeclared_ssh_key_is_ignored() {
        let api = FakeApi::new();
        api.on(
            Method::Get,
            &format!("{ENV}/baremetals/{BAREMETAL_ID}"),
            ApiResponse::ok(json!({
                "id": BAREMETAL_ID,
                "name": "db-1",
                "templateId": TEMPLATE_ID,
                "computeOfferingId": OFFERING_ID,
                "networkId": "net-1",
                "sshKeyName": "bootstrap"
            })),
        );
        api.on(
            Method::Get,
            &format!("{ENV}/templates"),
            ApiResponse::ok(json!([{"id": TEMPLATE_ID, "name": "Ubuntu 22.04"}])),
        );
        let catalog = resource_catalog(&api);

        let observed = reconciler::read(
            &BaremetalReconciler,
            &catalog,
            BAREMETAL_ID,
            &spec(),
            reconciler::ReadMode::ExpectingPresence,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(observed.spec, spec());
        assert!(BaremetalReconciler.plan(&observed.spec, &spec()).unwrap().is_empty());

        let declared = BaremetalSpec {
            ssh_key_name: Some("deploy".into()),
            ..spec()
        };
        let observed = reconciler::read(
            &BaremetalReconciler,
            &catalog,
            BAREMETAL_ID,
            &declared,
            reconciler::ReadMode::ExpectingPresence,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(observed.spec.ssh_key_name.as_deref(), Some("bootstrap"));
        assert_eq!(
            BaremetalReconciler.plan(&observed.spec, &declared).unwrap(),
            vec![BaremetalOperation::AssociateSshKey {
                ssh_key_name: "deploy".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_create_sends_template_as_image() {
        let api = FakeApi::new();
        api.on(
            Method::Get,
            &format!("{ENV}/templates"),
            ApiResponse::ok(json!([{"id": TEMPLATE_ID, "name": "Ubuntu 22.04"}])),
        );
        api.on(
            Method::Post,
            &format!("{ENV}/baremetals?operation=acquireBareMetal"),
            ApiResponse::ok(json!({
                "id": BAREMETAL_ID,
                "ipAddress": "10.0.0.5",
                "username": "ubuntu",
                "password": "s3cret"
            })),
        );
        api.on(
            Method::Get,
            &format!("{ENV}/baremetals/{BAREMETAL_ID}"),
            ApiResponse::ok(json!({
                "id": BAREMETAL_ID,
                "name": "db-1",
                "templateId": TEMPLATE_ID,
                "templateName": "Ubuntu 22.04",
                "computeOfferingId": OFFERING_ID,
                "networkId": "net-1",
                "ipAddress": "10.0.0.5",
                "ipAddressId": "ip-1",
                "affinityGroupIds": [GROUP_ID, "other"]
            })),
        );
        api.on(
            Method::Get,
            &format!("{ENV}/affinitygroups"),
            ApiResponse::ok(json!([{"id": GROUP_ID, "name": "dedicated"}])),
        );
        let catalog = resource_catalog(&api);

        let declared = BaremetalSpec {
            dedicated_group_id: Some(GROUP_ID.into()),
            ..spec()
        };
        let result = reconciler::create(&BaremetalReconciler, &catalog, &declared).await;
        assert!(result.is_success(), "{:?}", result.error);

        let create = api
            .requests()
            .into_iter()
            .find(|r| r.method == Method::Post)
            .unwrap();
        assert_eq!(create.operation(), Some("acquireBareMetal"));
        let body = create.body.unwrap();
        assert_eq!(body["templateId"], TEMPLATE_ID);
        assert_eq!(body["imageId"], TEMPLATE_ID);
        assert_eq!(body["hypervisor"], "Baremetal");
        assert_eq!(body["computeOfferingId"], OFFERING_ID);
        assert_eq!(body["dedicatedGroupId"], GROUP_ID);

        let observed = result.observed.unwrap();
        assert_eq!(observed.spec.dedicated_group_id.as_deref(), Some(GROUP_ID));
        assert_eq!(observed.spec, declared);
        assert_eq!(observed.computed["user"], "ubuntu");
        assert_eq!(observed.computed["private_ip_id"], "ip-1");
        // compute offering given by id is never listed
        assert_eq!(api.count(Method::Get, &format!("{ENV}/computeofferings")), 0);
    }

    #[tokio::test]
    async fn test_remove_releases() {
        let api = FakeApi::new();
        api.on(
            Method::Post,
            &format!("{ENV}/baremetals/{BAREMETAL_ID}?operation=releaseBareMetal"),
            ApiResponse::ok(json!({})).with_task("t-1", "PENDING"),
        );
        let catalog = resource_catalog(&api);

        let result =
            reconciler::delete(&BaremetalReconciler, &catalog, BAREMETAL_ID, &spec()).await;
        assert!(result.is_success());
        assert_eq!(result.tasks.len(), 1);
    }
}
