//! Entity reconcilers
//!
//! One module per entity type. Each defines the declared spec, the wire
//! record it exchanges with the API and a [`crate::Reconciler`] impl.

pub mod baremetal;
pub mod environment;
pub mod network;
pub mod network_acl;
pub mod port_forwarding_rule;
pub mod public_ip;
pub mod ssh_key;
pub mod static_nat;
pub mod volume;
pub mod vpc;
pub mod vpn_user;

pub use baremetal::{BaremetalOperation, BaremetalReconciler, BaremetalSpec};
pub use environment::{EnvironmentOperation, EnvironmentReconciler, EnvironmentSpec};
pub use network::{NetworkOperation, NetworkReconciler, NetworkSpec};
pub use network_acl::{NetworkAclReconciler, NetworkAclSpec};
pub use port_forwarding_rule::{PortForwardingRuleReconciler, PortForwardingRuleSpec};
pub use public_ip::{PublicIpReconciler, PublicIpSpec};
pub use ssh_key::{SshKeyReconciler, SshKeySpec};
pub use static_nat::{StaticNatReconciler, StaticNatSpec};
pub use volume::{ResizeErrorPolicy, VolumeOperation, VolumeReconciler, VolumeSpec};
pub use vpc::{VpcOperation, VpcReconciler, VpcSpec};
pub use vpn_user::{VpnUserReconciler, VpnUserSpec};

use crate::api::Options;

fn options(pairs: &[(&str, &str)]) -> Options {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}
