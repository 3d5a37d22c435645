//! Update planning
//!
//! Fields of an entity are grouped into update families. Each family is
//! applied by one remote operation, so a change to any field of a family
//! plans exactly that family's operation. Fields outside every family are
//! either immutable (a change means replacement) or not updatable.

use crate::spec::DesiredSpec;
use std::fmt;

/// A group of fields updated together by one remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFamily {
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

impl UpdateFamily {
    pub fn changed(&self, old: &DesiredSpec, new: &DesiredSpec) -> bool {
        self.fields.iter().any(|field| old.differs(new, field))
    }
}

/// Fields among `fields` whose values differ
pub fn changed_fields(
    old: &DesiredSpec,
    new: &DesiredSpec,
    fields: &[&'static str],
) -> Vec<&'static str> {
    fields
        .iter()
        .copied()
        .filter(|field| old.differs(new, field))
        .collect()
}

/// Families with at least one changed field, in declaration order
pub fn changed_families<'a>(
    old: &DesiredSpec,
    new: &DesiredSpec,
    families: &'a [UpdateFamily],
) -> Vec<&'a UpdateFamily> {
    families
        .iter()
        .filter(|family| family.changed(old, new))
        .collect()
}

/// A planned remote mutation
pub trait RemoteOperation: fmt::Debug + Clone + Send + Sync {
    /// Name of the update family this operation applies
    fn family(&self) -> &'static str;
}

/// Operation type of entities that cannot be updated in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOperation {}

impl RemoteOperation for NoOperation {
    fn family(&self) -> &'static str {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAMILIES: &[UpdateFamily] = &[
        UpdateFamily {
            name: "details",
            fields: &["name", "description"],
        },
        UpdateFamily {
            name: "acl",
            fields: &["network_acl"],
        },
    ];

    fn spec(name: &str, description: &str, acl: &str) -> DesiredSpec {
        DesiredSpec::new()
            .with("name", name)
            .with("description", description)
            .with("network_acl", acl)
    }

    #[test]
    fn test_no_change_plans_nothing() {
        let old = spec("web", "front", "default_allow");
        assert!(changed_families(&old, &old.clone(), FAMILIES).is_empty());
    }

    #[test]
    fn test_one_field_plans_its_family_once() {
        let old = spec("web", "front", "default_allow");
        let new = spec("web2", "front end", "default_allow");
        let planned: Vec<_> = changed_families(&old, &new, FAMILIES)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(planned, vec!["details"]);
    }

    #[test]
    fn test_all_families_in_order() {
        let old = spec("web", "front", "default_allow");
        let new = spec("web", "back", "default_deny");
        let planned: Vec<_> = changed_families(&old, &new, FAMILIES)
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(planned, vec!["details", "acl"]);
    }

    #[test]
    fn test_changed_fields_subset() {
        let old = spec("web", "front", "default_allow");
        let new = spec("web", "back", "default_deny");
        assert_eq!(
            changed_fields(&old, &new, &["name", "network_acl"]),
            vec!["network_acl"]
        );
    }
}
