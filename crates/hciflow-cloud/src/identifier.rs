//! Name-or-id references
//!
//! Users may refer to any remote record either by its opaque identifier or
//! by a human-readable name. Opaque identifiers are trusted as-is and never
//! looked up; names are resolved against a [`CatalogEntry`]. When a record is
//! read back, the reference is projected into the same form the user wrote.

use crate::catalog::CatalogEntry;
use crate::error::{CloudError, Result};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("identifier pattern is a valid regex")
});

/// Lexical class of a user-supplied token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    OpaqueId,
    Name,
}

/// 8-4-4-4-12 hexadecimal groups, any case
pub fn classify(token: &str) -> TokenClass {
    if ID_PATTERN.is_match(token) {
        TokenClass::OpaqueId
    } else {
        TokenClass::Name
    }
}

pub fn is_id(token: &str) -> bool {
    classify(token) == TokenClass::OpaqueId
}

/// Resolve a token to an identifier.
///
/// Opaque ids come back unchanged. Names match case-insensitively; with
/// duplicate names the first entry in catalog order wins.
pub fn resolve_id(token: &str, catalog: &CatalogEntry) -> Result<String> {
    if is_id(token) {
        return Ok(token.to_string());
    }
    catalog
        .find_by_name(token)
        .map(|item| item.id.clone())
        .ok_or_else(|| {
            CloudError::NotFound(format!(
                "{} with name {} not found",
                catalog.resource_type(),
                token
            ))
        })
}

/// A reference to a remote record, as written by the user
#[derive(Debug, Clone, Eq)]
pub enum Reference {
    Id(String),
    Name(String),
}

impl Reference {
    pub fn parse(token: impl Into<String>) -> Self {
        let token = token.into();
        if is_id(&token) {
            Reference::Id(token)
        } else {
            Reference::Name(token)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Reference::Id(s) | Reference::Name(s) => s,
        }
    }

    pub fn is_id(&self) -> bool {
        matches!(self, Reference::Id(_))
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }

    pub fn resolve(&self, catalog: &CatalogEntry) -> Result<String> {
        resolve_id(self.as_str(), catalog)
    }

    /// Read-back projection.
    ///
    /// An id stays an id. A name becomes the remote display name, keeping the
    /// user's spelling when it matches case-insensitively; without a display
    /// name the id is used.
    pub fn project(&self, id: &str, display_name: Option<&str>) -> Reference {
        match (self, display_name.filter(|n| !n.is_empty())) {
            (Reference::Id(_), _) => Reference::Id(id.to_string()),
            (Reference::Name(declared), Some(name)) if declared.eq_ignore_ascii_case(name) => {
                Reference::Name(declared.clone())
            }
            (Reference::Name(_), Some(name)) => Reference::Name(name.to_string()),
            (Reference::Name(_), None) => Reference::Id(id.to_string()),
        }
    }
}

impl Default for Reference {
    fn default() -> Self {
        Reference::Name(String::new())
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        self.is_id() == other.is_id() && self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Hash for Reference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.is_id().hash(state);
        self.as_str().to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Reference {
    fn from(token: &str) -> Self {
        Reference::parse(token)
    }
}

impl From<String> for Reference {
    fn from(token: String) -> Self {
        Reference::parse(token)
    }
}

impl Serialize for Reference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Reference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Reference::parse)
    }
}

/// Resolve `reference`, fetching the catalog only for names.
pub async fn resolve_reference<F, Fut>(reference: &Reference, catalog: F) -> Result<String>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<CatalogEntry>>>,
{
    match reference {
        Reference::Id(id) => Ok(id.clone()),
        Reference::Name(name) => resolve_id(name, &*catalog().await?),
    }
}

/// Project `declared` onto a read-back record.
///
/// Names need the record's display name; when the record omits it the
/// catalog is consulted. Ids never trigger a lookup.
pub async fn project_reference<F, Fut>(
    declared: &Reference,
    id: &str,
    display_name: &str,
    catalog: F,
) -> Result<Reference>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<CatalogEntry>>>,
{
    if id.is_empty() {
        return Ok(declared.clone());
    }
    if declared.is_id() || !display_name.is_empty() {
        return Ok(declared.project(id, Some(display_name)));
    }
    let catalog = catalog().await?;
    Ok(declared.project(id, catalog.name_of(id)))
}
