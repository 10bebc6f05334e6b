//! Node Identity
//!
//! A repository node is addressed by the store it lives in plus an opaque id:
//! `scheme://address/id`. The id is either a server-issued UUID (persisted node)
//! or a session-local temporary token (new node that has not been saved yet).
//!
//! # Examples
//!
//! ```rust
//! use repograph_core::models::{Identity, StoreRef};
//!
//! let store = StoreRef::new("workspace", "SpacesStore");
//! let identity = Identity::new(store, "4a1f0c9e-8c1e-4a4e-9d63-1f5b2b7a0c11");
//! assert_eq!(
//!     identity.to_string(),
//!     "workspace://SpacesStore/4a1f0c9e-8c1e-4a4e-9d63-1f5b2b7a0c11"
//! );
//!
//! let parsed: Identity = identity.to_string().parse().unwrap();
//! assert_eq!(parsed, identity);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when parsing a store or node reference string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReferenceParseError {
    #[error("Missing '://' separator in reference: {0}")]
    MissingScheme(String),

    #[error("Missing node id in reference: {0}")]
    MissingId(String),

    #[error("Empty component in reference: {0}")]
    EmptyComponent(String),
}

/// A content store, e.g. `workspace://SpacesStore`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreRef {
    pub scheme: String,
    pub address: String,
}

impl StoreRef {
    pub fn new(scheme: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            address: address.into(),
        }
    }

    /// The default store most repository content lives in
    pub fn spaces_store() -> Self {
        Self::new("workspace", "SpacesStore")
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.address)
    }
}

impl FromStr for StoreRef {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, address) = s
            .split_once("://")
            .ok_or_else(|| ReferenceParseError::MissingScheme(s.to_string()))?;
        if scheme.is_empty() || address.is_empty() || address.contains('/') {
            return Err(ReferenceParseError::EmptyComponent(s.to_string()));
        }
        Ok(Self::new(scheme, address))
    }
}

/// Full address of one repository node
///
/// Two identities are equal iff store scheme, store address and id all match.
/// The `Display` form doubles as a map key and as the predicate sent to the
/// remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub store: StoreRef,
    #[serde(rename = "uuid")]
    pub id: String,
}

impl Identity {
    pub fn new(store: StoreRef, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
        }
    }

    /// Same store, different id (used when a temporary id is replaced)
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self::new(self.store.clone(), id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store, self.id)
    }
}

impl FromStr for Identity {
    type Err = ReferenceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| ReferenceParseError::MissingScheme(s.to_string()))?;
        let (address, id) = rest
            .split_once('/')
            .ok_or_else(|| ReferenceParseError::MissingId(s.to_string()))?;
        if scheme.is_empty() || address.is_empty() || id.is_empty() {
            return Err(ReferenceParseError::EmptyComponent(s.to_string()));
        }
        Ok(Self::new(StoreRef::new(scheme, address), id))
    }
}

/// Session-local handle to one live node
///
/// A `NodeRef` indexes the session's node registry. It stays valid when the
/// node's temporary id is replaced by a server id during save, which is why
/// relation records and content handles point at nodes through it rather than
/// through an [`Identity`].
///
/// Handles carry the id of the registry that issued them; any other registry
/// rejects them as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    registry: u32,
    slot: usize,
}

impl NodeRef {
    pub(crate) fn new(registry: u32, slot: usize) -> Self {
        Self { registry, slot }
    }

    /// Id of the registry that issued this handle
    pub fn registry(&self) -> u32 {
        self.registry
    }

    /// Registry slot index
    pub fn index(&self) -> usize {
        self.slot
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.registry, self.slot)
    }
}
