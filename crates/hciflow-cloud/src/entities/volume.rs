//! Volumes
//!
//! Custom size and IOPS are only accepted when the disk offering allows
//! them. A volume can be moved between instances and grown, never shrunk.

use super::non_empty;
use crate::api::{Options, TaskRef};
use crate::catalog::{CatalogEntry, CatalogItem, ResourceCatalog};
use crate::error::{CloudError, Result};
use crate::identifier::{Reference, project_reference, resolve_reference};
use crate::plan::{RemoteOperation, UpdateFamily};
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const ENTITY_TYPE: &str = "volumes";
const DISK_OFFERINGS: &str = "diskofferings";

const ATTACHMENT: UpdateFamily = UpdateFamily {
    name: "attachment",
    fields: &["instance_id"],
};
const RESIZE: UpdateFamily = UpdateFamily {
    name: "resize",
    fields: &["size_in_gb", "iops"],
};
const FAMILIES: &[UpdateFamily] = &[ATTACHMENT, RESIZE];
const IMMUTABLE: &[&str] = &["environment_id", "name", "disk_offering", "zone"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub environment_id: String,
    pub name: String,
    pub disk_offering: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_gb: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Reference>,
}

impl Declare for VolumeSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("name", &self.name)
            .with("disk_offering", &self.disk_offering)
            .with("size_in_gb", self.size_in_gb)
            .with("iops", self.iops)
            .with("instance_id", &self.instance_id)
            .with("zone", &self.zone)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteVolume {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    disk_offering_id: String,
    #[serde(skip_serializing)]
    disk_offering_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gb_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iops: Option<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    instance_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    zone_id: String,
    #[serde(skip_serializing)]
    zone_name: String,
}

/// What to do when the remote resize call fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeErrorPolicy {
    /// Log the failure and carry on
    #[default]
    Discard,
    /// Fail the update with the remote error
    Propagate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeOperation {
    /// Detach from the current instance (if attached), then attach to `attach_to`
    Reattach {
        detach: bool,
        attach_to: Option<String>,
    },
    Resize {
        size_in_gb: Option<i64>,
        iops: Option<i64>,
    },
}

impl RemoteOperation for VolumeOperation {
    fn family(&self) -> &'static str {
        match self {
            VolumeOperation::Reattach { .. } => ATTACHMENT.name,
            VolumeOperation::Resize { .. } => RESIZE.name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeReconciler {
    resize_errors: ResizeErrorPolicy,
}

impl VolumeReconciler {
    pub fn new(resize_errors: ResizeErrorPolicy) -> Self {
        Self { resize_errors }
    }

    async fn disk_offering(
        &self,
        catalog: &ResourceCatalog,
        offering: &Reference,
    ) -> Result<CatalogItem> {
        match offering {
            Reference::Id(id) => {
                let record: Value = catalog.service(DISK_OFFERINGS).get_as(id).await?;
                CatalogEntry::from_records("Disk offering", vec![record], "name")
                    .entries()
                    .first()
                    .cloned()
                    .ok_or_else(|| {
                        CloudError::UnexpectedResponse(format!("disk offering {id} has no id"))
                    })
            }
            Reference::Name(_) => {
                let offerings = catalog.disk_offerings().await?;
                let id = offering.resolve(&offerings)?;
                offerings.find_by_id(&id).cloned().ok_or_else(|| {
                    CloudError::NotFound(format!("Disk offering {id} not found"))
                })
            }
        }
    }
}

fn check_capabilities(
    offering: &CatalogItem,
    size_in_gb: Option<i64>,
    iops: Option<i64>,
) -> Result<()> {
    if size_in_gb.is_some() && !offering.flag("customSize") {
        return Err(CloudError::Validation(format!(
            "Disk offering {} doesn't allow custom size",
            offering.id
        )));
    }
    if iops.is_some() && !offering.flag("customIops") {
        return Err(CloudError::Validation(format!(
            "Disk offering {} doesn't allow custom IOPS",
            offering.id
        )));
    }
    Ok(())
}

#[async_trait]
impl Reconciler for VolumeReconciler {
    type Spec = VolumeSpec;
    type Operation = VolumeOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Volume"
    }

    fn families(&self) -> &'static [UpdateFamily] {
        FAMILIES
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, old: &VolumeSpec, new: &VolumeSpec) -> Result<Vec<VolumeOperation>> {
        let (before, after) = (old.declared(), new.declared());
        let mut operations = Vec::new();

        if ATTACHMENT.changed(&before, &after) {
            operations.push(VolumeOperation::Reattach {
                detach: old.instance_id.as_deref().is_some_and(|i| !i.is_empty()),
                attach_to: new.instance_id.clone().filter(|i| !i.is_empty()),
            });
        }

        if RESIZE.changed(&before, &after) {
            if let (Some(current), Some(requested)) = (old.size_in_gb, new.size_in_gb) {
                if requested < current {
                    return Err(CloudError::Validation(format!(
                        "cannot reduce size of a volume from {current} GB to {requested} GB"
                    )));
                }
            }
            operations.push(VolumeOperation::Resize {
                size_in_gb: new.size_in_gb,
                iops: new.iops,
            });
        }

        Ok(operations)
    }

    async fn plan_update(
        &self,
        catalog: &ResourceCatalog,
        old: &VolumeSpec,
        new: &VolumeSpec,
    ) -> Result<Vec<VolumeOperation>> {
        let operations = self.plan(old, new)?;
        let resizes = operations
            .iter()
            .any(|op| matches!(op, VolumeOperation::Resize { .. }));
        if resizes {
            let offering = self.disk_offering(catalog, &new.disk_offering).await?;
            check_capabilities(
                &offering,
                new.size_in_gb.filter(|_| old.size_in_gb != new.size_in_gb),
                new.iops.filter(|_| old.iops != new.iops),
            )?;
        }
        Ok(operations)
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &VolumeSpec) -> Result<Created> {
        let disk_offering_id = if spec.size_in_gb.is_some() || spec.iops.is_some() {
            let offering = self.disk_offering(catalog, &spec.disk_offering).await?;
            check_capabilities(&offering, spec.size_in_gb, spec.iops)?;
            offering.id
        } else {
            resolve_reference(&spec.disk_offering, || catalog.disk_offerings()).await?
        };
        let zone_id = match &spec.zone {
            Some(zone) => resolve_reference(zone, || catalog.zones()).await?,
            None => String::new(),
        };

        let body = RemoteVolume {
            name: spec.name.clone(),
            disk_offering_id,
            gb_size: spec.size_in_gb,
            iops: spec.iops,
            instance_id: spec.instance_id.clone().unwrap_or_default(),
            zone_id,
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("creating volume {}", spec.name)))?;
        let created: RemoteVolume = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &VolumeSpec,
    ) -> Result<Option<ObservedState<VolumeSpec>>> {
        let volume: RemoteVolume = catalog.service(ENTITY_TYPE).get_as(id).await?;

        let zone = match &declared.zone {
            Some(zone) => {
                let zones = || catalog.zones();
                Some(project_reference(zone, &volume.zone_id, &volume.zone_name, zones).await?)
            }
            None => None,
        };
        let disk_offering = project_reference(
            &declared.disk_offering,
            &volume.disk_offering_id,
            &volume.disk_offering_name,
            || catalog.disk_offerings(),
        )
        .await?;
        let spec = VolumeSpec {
            environment_id: declared.environment_id.clone(),
            name: volume.name.clone(),
            disk_offering,
            size_in_gb: declared.size_in_gb.and(volume.gb_size),
            iops: declared.iops.and(volume.iops),
            instance_id: non_empty(&volume.instance_id).map(str::to_string),
            zone,
        };

        let mut observed = ObservedState::new(id, spec)
            .with_text("disk_offering_id", &volume.disk_offering_id)
            .with_text("zone_id", &volume.zone_id);
        if let Some(size) = volume.gb_size {
            observed = observed.with_computed("size_in_gb", size);
        }
        if let Some(iops) = volume.iops {
            observed = observed.with_computed("iops", iops);
        }
        Ok(Some(observed))
    }

    async fn execute(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _new: &VolumeSpec,
        operation: &VolumeOperation,
    ) -> Result<Option<TaskRef>> {
        let service = catalog.service(ENTITY_TYPE);
        match operation {
            VolumeOperation::Reattach { detach, attach_to } => {
                let mut task = None;
                if *detach {
                    let current: RemoteVolume = service.get_as(id).await?;
                    if !current.instance_id.is_empty() {
                        task = service.execute(id, "detachFromInstance", None).await?.task();
                    }
                }
                if let Some(instance_id) = attach_to {
                    task = service
                        .execute(id, "attachToInstance", Some(json!({ "instanceId": instance_id })))
                        .await?
                        .task();
                }
                Ok(task)
            }
            VolumeOperation::Resize { size_in_gb, iops } => {
                let body = RemoteVolume {
                    id: id.to_string(),
                    gb_size: *size_in_gb,
                    iops: *iops,
                    ..Default::default()
                };
                let response = service
                    .execute(id, "resize", Some(serde_json::to_value(&body)?))
                    .await?;
                Ok(response.task())
            }
        }
    }

    fn discards_failure(&self, operation: &VolumeOperation, _error: &CloudError) -> bool {
        matches!(operation, VolumeOperation::Resize { .. })
            && self.resize_errors == ResizeErrorPolicy::Discard
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &VolumeSpec,
    ) -> Result<Option<TaskRef>> {
        let service = catalog.service(ENTITY_TYPE);
        if declared.instance_id.as_deref().is_some_and(|i| !i.is_empty()) {
            service.execute(id, "detachFromInstance", None).await?;
        }
        Ok(service.delete(id).await?.task())
    }
}
