//! SSH keys registered in an environment

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ENTITY_TYPE: &str = "sshkeys";

const IMMUTABLE: &[&str] = &["environment_id", "name", "public_key"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshKeySpec {
    pub environment_id: String,
    pub name: String,
    pub public_key: String,
}

impl Declare for SshKeySpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("name", &self.name)
            .with("public_key", &self.public_key)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemoteSshKey {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    public_key: String,
    #[serde(skip_serializing)]
    fingerprint: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SshKeyReconciler;

#[async_trait]
impl Reconciler for SshKeyReconciler {
    type Spec = SshKeySpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "SSH key"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(&self, _old: &SshKeySpec, _new: &SshKeySpec) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(&self, catalog: &ResourceCatalog, spec: &SshKeySpec) -> Result<Created> {
        let body = RemoteSshKey {
            name: spec.name.clone(),
            public_key: spec.public_key.clone(),
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await
            .map_err(|e| e.during(format!("creating SSH key {}", spec.name)))?;
        let created: RemoteSshKey = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    /// The API never returns the public key, so the declared one is kept
    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &SshKeySpec,
    ) -> Result<Option<ObservedState<SshKeySpec>>> {
        let key: RemoteSshKey = catalog.service(ENTITY_TYPE).get_as(id).await?;
        let spec = SshKeySpec {
            environment_id: declared.environment_id.clone(),
            name: key.name,
            public_key: declared.public_key.clone(),
        };
        Ok(Some(ObservedState::new(id, spec).with_text("fingerprint", &key.fingerprint)))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &SshKeySpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &SshKeySpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
