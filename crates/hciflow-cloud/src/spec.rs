//! Field-level view of a declared entity
//!
//! Planning and replacement checks compare two [`DesiredSpec`]s field by
//! field. Each entity spec renders itself into one via [`Declare`].

use crate::identifier::Reference;
use crate::membership::MemberSet;
use indexmap::IndexMap;

/// Value of one declared field. Empty text is normalized to `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Absent,
    Text(String),
    Integer(i64),
    Flag(bool),
    Ref(Reference),
    Members(MemberSet),
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            FieldValue::Absent
        } else {
            FieldValue::Text(value.to_string())
        }
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        FieldValue::from(value.as_str())
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(value: &Option<String>) -> Self {
        value.as_deref().map_or(FieldValue::Absent, FieldValue::from)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Absent, FieldValue::Integer)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<&Reference> for FieldValue {
    fn from(value: &Reference) -> Self {
        if value.is_empty() {
            FieldValue::Absent
        } else {
            FieldValue::Ref(value.clone())
        }
    }
}

impl From<&Option<Reference>> for FieldValue {
    fn from(value: &Option<Reference>) -> Self {
        value.as_ref().map_or(FieldValue::Absent, FieldValue::from)
    }
}

impl From<&MemberSet> for FieldValue {
    fn from(value: &MemberSet) -> Self {
        FieldValue::Members(value.clone())
    }
}

static ABSENT: FieldValue = FieldValue::Absent;

/// Ordered field map of one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredSpec {
    fields: IndexMap<&'static str, FieldValue>,
}

impl DesiredSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name, value.into());
        self
    }

    /// Missing fields read as `Absent`
    pub fn get(&self, name: &str) -> &FieldValue {
        self.fields.get(name).unwrap_or(&ABSENT)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    pub fn differs(&self, other: &DesiredSpec, name: &str) -> bool {
        self.get(name) != other.get(name)
    }
}

/// Implemented by every declared entity spec
pub trait Declare {
    fn declared(&self) -> DesiredSpec;

    /// Environment the entity lives in; `None` for configuration entities
    fn environment_id(&self) -> Option<&str> {
        None
    }
}
