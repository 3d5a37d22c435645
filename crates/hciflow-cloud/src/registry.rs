//! Registry of entity kinds and the declared-entity manifest
//!
//! A manifest lists entities tagged by `kind`:
//!
//! ```yaml
//! entities:
//!   - kind: vpc
//!     environment_id: 0b6c1f5e-2d3a-4e7b-8c9d-1a2b3c4d5e6f
//!     name: main
//!     description: main vpc
//!     vpc_offering: Default VPC offering
//!   - kind: network_acl
//!     id: 6a7b8c9d-0e1f-4a2b-8c3d-4e5f6a7b8c9d
//!     environment_id: 0b6c1f5e-2d3a-4e7b-8c9d-1a2b3c4d5e6f
//!     name: web
//!     description: web tier
//!     vpc_id: 1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f
//! ```

use crate::entities::{
    BaremetalSpec, EnvironmentSpec, NetworkAclSpec, NetworkSpec, PortForwardingRuleSpec,
    PublicIpSpec, SshKeySpec, StaticNatSpec, VolumeSpec, VpcSpec, VpnUserSpec,
};
use crate::error::CloudError;
use crate::spec::Declare;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Environment,
    Vpc,
    Network,
    NetworkAcl,
    Volume,
    Baremetal,
    PublicIp,
    StaticNat,
    SshKey,
    VpnUser,
    PortForwardingRule,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Environment,
        EntityKind::Vpc,
        EntityKind::Network,
        EntityKind::NetworkAcl,
        EntityKind::Volume,
        EntityKind::Baremetal,
        EntityKind::PublicIp,
        EntityKind::StaticNat,
        EntityKind::SshKey,
        EntityKind::VpnUser,
        EntityKind::PortForwardingRule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Environment => "environment",
            EntityKind::Vpc => "vpc",
            EntityKind::Network => "network",
            EntityKind::NetworkAcl => "network_acl",
            EntityKind::Volume => "volume",
            EntityKind::Baremetal => "baremetal",
            EntityKind::PublicIp => "public_ip",
            EntityKind::StaticNat => "static_nat",
            EntityKind::SshKey => "ssh_key",
            EntityKind::VpnUser => "vpn_user",
            EntityKind::PortForwardingRule => "port_forwarding_rule",
        }
    }

    /// Whether entities of this kind live inside an environment
    pub fn is_environment_scoped(self) -> bool {
        self != EntityKind::Environment
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<_> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
                CloudError::Validation(format!(
                    "unknown entity kind '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// A declared entity of any kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declared {
    Environment(EnvironmentSpec),
    Vpc(VpcSpec),
    Network(NetworkSpec),
    NetworkAcl(NetworkAclSpec),
    Volume(VolumeSpec),
    Baremetal(BaremetalSpec),
    PublicIp(PublicIpSpec),
    StaticNat(StaticNatSpec),
    SshKey(SshKeySpec),
    VpnUser(VpnUserSpec),
    PortForwardingRule(PortForwardingRuleSpec),
}

impl Declared {
    pub fn kind(&self) -> EntityKind {
        match self {
            Declared::Environment(_) => EntityKind::Environment,
            Declared::Vpc(_) => EntityKind::Vpc,
            Declared::Network(_) => EntityKind::Network,
            Declared::NetworkAcl(_) => EntityKind::NetworkAcl,
            Declared::Volume(_) => EntityKind::Volume,
            Declared::Baremetal(_) => EntityKind::Baremetal,
            Declared::PublicIp(_) => EntityKind::PublicIp,
            Declared::StaticNat(_) => EntityKind::StaticNat,
            Declared::SshKey(_) => EntityKind::SshKey,
            Declared::VpnUser(_) => EntityKind::VpnUser,
            Declared::PortForwardingRule(_) => EntityKind::PortForwardingRule,
        }
    }

    fn as_declare(&self) -> &dyn Declare {
        match self {
            Declared::Environment(spec) => spec,
            Declared::Vpc(spec) => spec,
            Declared::Network(spec) => spec,
            Declared::NetworkAcl(spec) => spec,
            Declared::Volume(spec) => spec,
            Declared::Baremetal(spec) => spec,
            Declared::PublicIp(spec) => spec,
            Declared::StaticNat(spec) => spec,
            Declared::SshKey(spec) => spec,
            Declared::VpnUser(spec) => spec,
            Declared::PortForwardingRule(spec) => spec,
        }
    }

    /// Environment the entity lives in; `None` for environments themselves
    pub fn environment_id(&self) -> Option<&str> {
        self.as_declare().environment_id()
    }

    /// An empty declaration of `kind`, used to read an entity that is
    /// not in a manifest. References read back by display name.
    pub fn default_for(kind: EntityKind, environment_id: &str) -> Declared {
        let environment_id = environment_id.to_string();
        match kind {
            EntityKind::Environment => Declared::Environment(EnvironmentSpec::default()),
            EntityKind::Vpc => Declared::Vpc(VpcSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::Network => Declared::Network(NetworkSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::NetworkAcl => Declared::NetworkAcl(NetworkAclSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::Volume => Declared::Volume(VolumeSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::Baremetal => Declared::Baremetal(BaremetalSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::PublicIp => Declared::PublicIp(PublicIpSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::StaticNat => Declared::StaticNat(StaticNatSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::SshKey => Declared::SshKey(SshKeySpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::VpnUser => Declared::VpnUser(VpnUserSpec {
                environment_id,
                ..Default::default()
            }),
            EntityKind::PortForwardingRule => Declared::PortForwardingRule(PortForwardingRuleSpec {
                environment_id,
                ..Default::default()
            }),
        }
    }
}

/// One manifest entry: a declaration plus the remote id once known
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub spec: Declared,
}

impl DeclaredEntity {
    pub fn new(spec: Declared) -> Self {
        Self { id: None, spec }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.spec.kind()
    }

    /// `kind` plus id or `(new)`, for messages
    pub fn label(&self) -> String {
        format!("{} {}", self.kind(), self.id.as_deref().unwrap_or("(new)"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub entities: Vec<DeclaredEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Reference;
    use serde_json::json;

    #[test]
    fn test_kind_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
        assert_eq!(
            "Port-Forwarding-Rule".parse::<EntityKind>().unwrap(),
            EntityKind::PortForwardingRule
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = "loadbalancer".parse::<EntityKind>().unwrap_err();
        assert!(err.to_string().starts_with("unknown entity kind 'loadbalancer'"));
    }

    #[test]
    fn test_manifest_entry_is_tagged_by_kind() {
        let entry: DeclaredEntity = serde_json::from_value(json!({
            "kind": "vpc",
            "id": "1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
            "environment_id": "env-1",
            "name": "main",
            "description": "main vpc",
            "vpc_offering": "Default VPC offering"
        }))
        .unwrap();

        assert_eq!(entry.kind(), EntityKind::Vpc);
        assert_eq!(entry.id.as_deref(), Some("1c2d3e4f-5a6b-4c7d-8e9f-0a1b2c3d4e5f"));
        assert_eq!(entry.spec.environment_id(), Some("env-1"));
        let Declared::Vpc(vpc) = &entry.spec else {
            panic!("expected a vpc");
        };
        assert_eq!(vpc.vpc_offering, Reference::Name("Default VPC offering".into()));
        assert!(vpc.zone.is_none());
    }

    #[test]
    fn test_environment_has_no_environment_id() {
        let declared = Declared::default_for(EntityKind::Environment, "env-1");
        assert_eq!(declared.environment_id(), None);
        assert!(!EntityKind::Environment.is_environment_scoped());

        let declared = Declared::default_for(EntityKind::SshKey, "env-1");
        assert_eq!(declared.environment_id(), Some("env-1"));
        assert_eq!(declared.kind(), EntityKind::SshKey);
    }
}
