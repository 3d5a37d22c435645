//! Role membership of environments
//!
//! Members are declared as user ids or user names. [`MemberSet`] compares by
//! a lower-cased key, so `Alice` and `alice` are one member, and iterates in
//! key order. The first spelling inserted for a key is kept.

use crate::catalog::CatalogEntry;
use crate::error::{CloudError, Result};
use crate::identifier::Reference;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub const ENVIRONMENT_ADMIN_ROLE: &str = "Environment admin";
pub const USER_ROLE: &str = "User";
pub const READ_ONLY_ROLE: &str = "Read-only";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberSet {
    members: BTreeMap<String, Reference>,
}

impl MemberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member; returns false when the key was already present
    pub fn insert(&mut self, member: Reference) -> bool {
        let key = member.as_str().to_ascii_lowercase();
        if self.members.contains_key(&key) {
            return false;
        }
        self.members.insert(key, member);
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.members.contains_key(&token.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.members.values()
    }
}

impl<T: Into<Reference>> FromIterator<T> for MemberSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = MemberSet::new();
        for member in iter {
            set.insert(member.into());
        }
        set
    }
}

impl Serialize for MemberSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Reference::as_str))
    }
}

impl<'de> Deserialize<'de> for MemberSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<String>::deserialize(deserializer).map(|tokens| tokens.into_iter().collect())
    }
}

/// A user as listed on a remote role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoleMember {
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_name: String,
}

/// A role with its members resolved to ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub name: String,
    #[serde(default)]
    pub users: Vec<RoleMember>,
}

/// Resolve declared members against the organization's users.
/// Ids are taken as-is; an unknown name fails the whole role.
pub fn resolve_members(
    role_name: &str,
    declared: &MemberSet,
    users: &CatalogEntry,
) -> Result<RoleAssignment> {
    let users = declared
        .iter()
        .map(|member| match member {
            Reference::Id(id) => Ok(RoleMember {
                id: id.clone(),
                ..Default::default()
            }),
            Reference::Name(name) => users
                .find_by_name(name)
                .map(|user| RoleMember {
                    id: user.id.clone(),
                    ..Default::default()
                })
                .ok_or_else(|| CloudError::NotFound(format!("User {name} was not found"))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RoleAssignment {
        name: role_name.to_string(),
        users,
    })
}

/// Project the members present on a remote role into the declared form.
///
/// A member matched by id keeps the declared id, one matched by name keeps
/// the declared spelling, and an undeclared member appears by user name.
pub fn project_members(present: &[RoleMember], declared: &MemberSet) -> MemberSet {
    present
        .iter()
        .map(|user| {
            declared
                .iter()
                .find(|member| match member {
                    Reference::Id(id) => id.eq_ignore_ascii_case(&user.id),
                    Reference::Name(name) => name.eq_ignore_ascii_case(&user.user_name),
                })
                .cloned()
                .unwrap_or_else(|| Reference::parse(user.user_name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogItem;

    const ALICE: &str = "5d1b7e52-0a4f-4c8e-9d55-1f7d3a2c9b01";
    const BOB: &str = "9a3c2e10-6b7d-4f21-8e4a-0c5b6d7e8f90";

    fn users() -> CatalogEntry {
        CatalogEntry::new(
            "User",
            vec![CatalogItem::new(ALICE, "alice"), CatalogItem::new(BOB, "bob")],
        )
    }

    #[test]
    fn test_member_set_ignores_case() {
        let set: MemberSet = ["Alice", "alice", "ALICE", "bob"].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains("BOB"));
        let names: Vec<_> = set.iter().map(Reference::as_str).collect();
        assert_eq!(names, vec!["Alice", "bob"]);
    }

    #[test]
    fn test_resolve_mixed_members() {
        let declared: MemberSet = ["alice", BOB].into_iter().collect();
        let role = resolve_members(ENVIRONMENT_ADMIN_ROLE, &declared, &users()).unwrap();
        let mut ids: Vec<_> = role.users.iter().map(|u| u.id.as_str()).collect();
        ids.sort();
        let mut expected = vec![ALICE, BOB];
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(role.name, "Environment admin");
    }

    #[test]
    fn test_resolve_unknown_user() {
        let declared: MemberSet = ["carol"].into_iter().collect();
        let err = resolve_members(USER_ROLE, &declared, &users()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "User carol was not found");
    }

    #[test]
    fn test_projection_round_trip() {
        let declared: MemberSet = ["alice", BOB].into_iter().collect();
        let present = vec![
            RoleMember {
                id: ALICE.into(),
                user_name: "alice".into(),
            },
            RoleMember {
                id: BOB.into(),
                user_name: "bob".into(),
            },
        ];
        assert_eq!(project_members(&present, &declared), declared);
    }

    #[test]
    fn test_projection_reports_undeclared_by_name() {
        let declared: MemberSet = ["alice"].into_iter().collect();
        let present = vec![
            RoleMember {
                id: ALICE.into(),
                user_name: "Alice".into(),
            },
            RoleMember {
                id: BOB.into(),
                user_name: "bob".into(),
            },
        ];
        let projected = project_members(&present, &declared);
        let names: Vec<_> = projected.iter().map(Reference::as_str).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_member_set_serde() {
        let set: MemberSet = serde_json::from_str(r#"["bob","Alice","alice"]"#).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["Alice","bob"]"#);
    }
}
