//! Memoized lookup catalogs
//!
//! A catalog is the list of records of one kind (zones, offerings, users, ...)
//! used to turn names into ids. Each accessor lists its records at most once
//! per catalog instance, even under concurrent first access; a failed fetch
//! is not cached.

use crate::api::{ApiClient, Options};
use crate::context::EnvironmentContext;
use crate::error::{CloudError, Result};
use crate::service::EntityService;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// One record of a catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            attributes: Map::new(),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Ordered records of one resource type
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    resource_type: String,
    entries: Vec<CatalogItem>,
}

impl CatalogEntry {
    pub fn new(resource_type: impl Into<String>, entries: Vec<CatalogItem>) -> Self {
        Self {
            resource_type: resource_type.into(),
            entries,
        }
    }

    /// Build from raw API records, taking the display name from `name_field`.
    /// Records without an id are skipped.
    pub fn from_records(
        resource_type: impl Into<String>,
        records: Vec<Value>,
        name_field: &str,
    ) -> Self {
        let entries = records
            .into_iter()
            .filter_map(|record| match record {
                Value::Object(mut fields) => {
                    let id = match fields.remove("id") {
                        Some(Value::String(id)) if !id.is_empty() => id,
                        _ => return None,
                    };
                    let name = fields
                        .get(name_field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Some(CatalogItem {
                        id,
                        name,
                        attributes: fields,
                    })
                }
                _ => None,
            })
            .collect();
        Self::new(resource_type, entries)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn entries(&self) -> &[CatalogItem] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose name matches case-insensitively
    pub fn find_by_name(&self, name: &str) -> Option<&CatalogItem> {
        self.entries
            .iter()
            .find(|item| item.name.eq_ignore_ascii_case(name))
    }

    pub fn find_by_id(&self, id: &str) -> Option<&CatalogItem> {
        self.entries
            .iter()
            .find(|item| item.id.eq_ignore_ascii_case(id))
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.find_by_id(id).map(|item| item.name.as_str())
    }
}

type Slot = OnceCell<Arc<CatalogEntry>>;

async fn fetch_once<F, Fut>(slot: &Slot, fetch: F) -> Result<Arc<CatalogEntry>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<CatalogEntry>>,
{
    slot.get_or_try_init(|| async move { fetch().await.map(Arc::new) })
        .await
        .map(Arc::clone)
}

fn keyed_slot(slots: &DashMap<String, Arc<Slot>>, key: &str) -> Arc<Slot> {
    slots.entry(key.to_string()).or_default().clone()
}

async fn list_catalog(
    service: EntityService,
    resource_type: &str,
    name_field: &str,
    options: Options,
) -> Result<CatalogEntry> {
    let records: Vec<Value> = service.list_as(options).await?;
    debug!(
        resource_type,
        endpoint = service.endpoint(),
        count = records.len(),
        "fetched catalog"
    );
    Ok(CatalogEntry::from_records(resource_type, records, name_field))
}

/// Catalogs of the configuration API, shared by all environments
pub struct DirectoryCatalog {
    client: Arc<dyn ApiClient>,
    organizations: Slot,
    service_connections: Slot,
    users: DashMap<String, Arc<Slot>>,
}

impl DirectoryCatalog {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            organizations: Slot::new(),
            service_connections: Slot::new(),
            users: DashMap::new(),
        }
    }

    pub fn client(&self) -> Arc<dyn ApiClient> {
        self.client.clone()
    }

    pub fn service(&self, entity_type: &str) -> EntityService {
        EntityService::configuration(self.client.clone(), entity_type)
    }

    /// Organizations named by entry point
    pub async fn organizations(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.organizations, || {
            list_catalog(
                self.service("organizations"),
                "Organization",
                "entryPoint",
                Options::new(),
            )
        })
        .await
    }

    /// Service connections named by service code
    pub async fn service_connections(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.service_connections, || {
            list_catalog(
                self.service("service_connections"),
                "Service connection",
                "serviceCode",
                Options::new(),
            )
        })
        .await
    }

    /// Users of one organization, named by user name
    pub async fn users_by_organization(&self, organization_id: &str) -> Result<Arc<CatalogEntry>> {
        let slot = keyed_slot(&self.users, organization_id);
        fetch_once(&slot, || {
            let options =
                Options::from([("organizationId".to_string(), organization_id.to_string())]);
            list_catalog(self.service("users"), "User", "userName", options)
        })
        .await
    }
}

/// Catalogs of one environment
pub struct ResourceCatalog {
    client: Arc<dyn ApiClient>,
    context: EnvironmentContext,
    directory: Arc<DirectoryCatalog>,
    network_offerings: Slot,
    vpc_offerings: Slot,
    compute_offerings: Slot,
    disk_offerings: Slot,
    templates: Slot,
    zones: Slot,
    dedicated_groups: Slot,
    acls: DashMap<String, Arc<Slot>>,
}

impl ResourceCatalog {
    pub fn new(
        client: Arc<dyn ApiClient>,
        context: EnvironmentContext,
        directory: Arc<DirectoryCatalog>,
    ) -> Self {
        Self {
            client,
            context,
            directory,
            network_offerings: Slot::new(),
            vpc_offerings: Slot::new(),
            compute_offerings: Slot::new(),
            disk_offerings: Slot::new(),
            templates: Slot::new(),
            zones: Slot::new(),
            dedicated_groups: Slot::new(),
            acls: DashMap::new(),
        }
    }

    pub fn context(&self) -> &EnvironmentContext {
        &self.context
    }

    pub fn directory(&self) -> &DirectoryCatalog {
        &self.directory
    }

    /// Service for an entity type inside this environment
    pub fn service(&self, entity_type: &str) -> EntityService {
        EntityService::scoped(self.client.clone(), &self.context, entity_type)
    }

    async fn list(
        &self,
        entity_type: &str,
        resource_type: &str,
        options: Options,
    ) -> Result<CatalogEntry> {
        list_catalog(self.service(entity_type), resource_type, "name", options).await
    }

    pub async fn network_offerings(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.network_offerings, || {
            self.list("networkofferings", "Network offering", Options::new())
        })
        .await
    }

    pub async fn vpc_offerings(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.vpc_offerings, || {
            self.list("vpcofferings", "VPC offering", Options::new())
        })
        .await
    }

    pub async fn compute_offerings(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.compute_offerings, || {
            self.list("computeofferings", "Compute offering", Options::new())
        })
        .await
    }

    /// Disk offerings; attributes carry `customSize` and `customIops`
    pub async fn disk_offerings(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.disk_offerings, || {
            self.list("diskofferings", "Disk offering", Options::new())
        })
        .await
    }

    pub async fn templates(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.templates, || {
            self.list("templates", "Template", Options::new())
        })
        .await
    }

    pub async fn zones(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.zones, || self.list("zones", "Zone", Options::new())).await
    }

    /// Affinity groups of type `ExplicitDedication`
    pub async fn dedicated_groups(&self) -> Result<Arc<CatalogEntry>> {
        fetch_once(&self.dedicated_groups, || {
            let options = Options::from([("type".to_string(), "ExplicitDedication".to_string())]);
            self.list("affinitygroups", "Dedicated group", options)
        })
        .await
    }

    /// Network ACLs of one VPC
    pub async fn acls_by_vpc(&self, vpc_id: &str) -> Result<Arc<CatalogEntry>> {
        if vpc_id.is_empty() {
            return Err(CloudError::Validation(
                "a VPC id is required to look up network ACLs".to_string(),
            ));
        }
        let slot = keyed_slot(&self.acls, vpc_id);
        fetch_once(&slot, || {
            let options = Options::from([("vpc_id".to_string(), vpc_id.to_string())]);
            self.list("networkacls", "Network ACL", options)
        })
        .await
    }

    /// Users of the environment's organization
    pub async fn users(&self) -> Result<Arc<CatalogEntry>> {
        self.directory
            .users_by_organization(&self.context.organization_id)
            .await
    }
}
