//! Port forwarding rules from a public IP to a private IP

use crate::api::{Options, TaskRef};
use crate::catalog::ResourceCatalog;
use crate::error::Result;
use crate::plan::NoOperation;
use crate::reconciler::{Created, ObservedState, Reconciler};
use crate::spec::{Declare, DesiredSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const ENTITY_TYPE: &str = "portforwardingrules";

const IMMUTABLE: &[&str] = &[
    "environment_id",
    "public_ip_id",
    "private_ip_id",
    "protocol",
    "public_port_start",
    "public_port_end",
    "private_port_start",
    "private_port_end",
];

/// Ports are kept as strings, the form the API uses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortForwardingRuleSpec {
    pub environment_id: String,
    pub public_ip_id: String,
    pub private_ip_id: String,
    /// `TCP` or `UDP`
    pub protocol: String,
    pub public_port_start: String,
    /// Defaults to the start port on the remote side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_port_end: Option<String>,
    pub private_port_start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_port_end: Option<String>,
}

impl Declare for PortForwardingRuleSpec {
    fn declared(&self) -> DesiredSpec {
        DesiredSpec::new()
            .with("environment_id", &self.environment_id)
            .with("public_ip_id", &self.public_ip_id)
            .with("private_ip_id", &self.private_ip_id)
            .with("protocol", &self.protocol)
            .with("public_port_start", &self.public_port_start)
            .with("public_port_end", &self.public_port_end)
            .with("private_port_start", &self.private_port_start)
            .with("private_port_end", &self.private_port_end)
    }

    fn environment_id(&self) -> Option<&str> {
        Some(&self.environment_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RemotePortForwardingRule {
    #[serde(skip_serializing_if = "String::is_empty")]
    id: String,
    public_ip_id: String,
    private_ip_id: String,
    protocol: String,
    public_port_start: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    public_port_end: String,
    private_port_start: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    private_port_end: String,
    #[serde(skip_serializing)]
    public_ip: String,
    #[serde(skip_serializing)]
    private_ip: String,
    #[serde(skip_serializing)]
    instance_id: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortForwardingRuleReconciler;

#[async_trait]
impl Reconciler for PortForwardingRuleReconciler {
    type Spec = PortForwardingRuleSpec;
    type Operation = NoOperation;
    type Scope = ResourceCatalog;

    fn entity(&self) -> &'static str {
        "Port forwarding rule"
    }

    fn immutable_fields(&self) -> &'static [&'static str] {
        IMMUTABLE
    }

    fn plan(
        &self,
        _old: &PortForwardingRuleSpec,
        _new: &PortForwardingRuleSpec,
    ) -> Result<Vec<NoOperation>> {
        Ok(Vec::new())
    }

    async fn create(
        &self,
        catalog: &ResourceCatalog,
        spec: &PortForwardingRuleSpec,
    ) -> Result<Created> {
        let body = RemotePortForwardingRule {
            public_ip_id: spec.public_ip_id.clone(),
            private_ip_id: spec.private_ip_id.clone(),
            protocol: spec.protocol.clone(),
            public_port_start: spec.public_port_start.clone(),
            public_port_end: spec.public_port_end.clone().unwrap_or_default(),
            private_port_start: spec.private_port_start.clone(),
            private_port_end: spec.private_port_end.clone().unwrap_or_default(),
            ..Default::default()
        };
        let response = catalog
            .service(ENTITY_TYPE)
            .create(serde_json::to_value(&body)?, Options::new())
            .await?;
        let created: RemotePortForwardingRule = response.decode()?;
        Ok(Created::new(created.id).with_task(response.task()))
    }

    async fn fetch(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        declared: &PortForwardingRuleSpec,
    ) -> Result<Option<ObservedState<PortForwardingRuleSpec>>> {
        let rule: RemotePortForwardingRule = catalog.service(ENTITY_TYPE).get_as(id).await?;
        let spec = PortForwardingRuleSpec {
            environment_id: declared.environment_id.clone(),
            public_ip_id: rule.public_ip_id.clone(),
            private_ip_id: rule.private_ip_id.clone(),
            protocol: rule.protocol.clone(),
            public_port_start: rule.public_port_start.clone(),
            public_port_end: declared
                .public_port_end
                .as_ref()
                .map(|_| rule.public_port_end.clone()),
            private_port_start: rule.private_port_start.clone(),
            private_port_end: declared
                .private_port_end
                .as_ref()
                .map(|_| rule.private_port_end.clone()),
        };
        Ok(Some(
            ObservedState::new(id, spec)
                .with_text("public_port_end", &rule.public_port_end)
                .with_text("private_port_end", &rule.private_port_end)
                .with_text("public_ip", &rule.public_ip)
                .with_text("private_ip", &rule.private_ip)
                .with_text("instance_id", &rule.instance_id),
        ))
    }

    async fn execute(
        &self,
        _catalog: &ResourceCatalog,
        _id: &str,
        _new: &PortForwardingRuleSpec,
        operation: &NoOperation,
    ) -> Result<Option<TaskRef>> {
        match *operation {}
    }

    async fn remove(
        &self,
        catalog: &ResourceCatalog,
        id: &str,
        _declared: &PortForwardingRuleSpec,
    ) -> Result<Option<TaskRef>> {
        Ok(catalog.service(ENTITY_TYPE).delete(id).await?.task())
    }
}
