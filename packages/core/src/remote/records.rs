//! Wire Records
//!
//! Structured records exchanged with the remote repository service. The exact
//! transport encoding belongs to the service implementation; these types fix
//! the shape the graph layer reads and writes.
//!
//! Relation queries answer with a [`ResultSet`]: rows of named string columns,
//! keyed by the well-known names in [`columns`].

use crate::models::{Identity, StoreRef};
use crate::remote::RemoteError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known result set column names
pub mod columns {
    pub const NODE_UUID: &str = "{http://www.alfresco.org/model/system/1.0}node-uuid";
    pub const STORE_PROTOCOL: &str = "{http://www.alfresco.org/model/system/1.0}store-protocol";
    pub const STORE_IDENTIFIER: &str = "{http://www.alfresco.org/model/system/1.0}store-identifier";
    pub const ASSOCIATION_TYPE: &str = "associationType";
    pub const ASSOCIATION_NAME: &str = "associationName";
    pub const IS_PRIMARY: &str = "isPrimary";
    pub const NTH_SIBLING: &str = "nthSibling";
}

/// One property as sent to or received from the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub name: String,
    pub is_multi_value: bool,
    pub value: serde_json::Value,
}

impl PropertyRecord {
    /// Build a record, flagging JSON arrays as multi-valued
    pub fn new(name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            is_multi_value: value.is_array(),
            value,
        }
    }
}

/// Result of a node read: type, location, aspects and raw property values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub aspects: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
}

/// Single named column value in a result row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValue {
    pub name: String,
    pub value: Option<String>,
}

/// One row of a relation query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub columns: Vec<NamedValue>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style)
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.columns.push(NamedValue {
            name: name.into(),
            value: Some(value.into()),
        });
        self
    }

    /// Append the three columns that address a peer node
    pub fn with_peer(self, identity: &Identity) -> Self {
        self.with(columns::NODE_UUID, identity.id.clone())
            .with(columns::STORE_PROTOCOL, identity.store.scheme.clone())
            .with(columns::STORE_IDENTIFIER, identity.store.address.clone())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.value.as_deref())
    }

    pub fn require(&self, name: &str) -> Result<&str, RemoteError> {
        self.get(name)
            .ok_or_else(|| RemoteError::malformed(format!("result row is missing column '{}'", name)))
    }

    /// Identity of the node on the other end of the edge this row describes
    pub fn peer_identity(&self) -> Result<Identity, RemoteError> {
        let id = self.require(columns::NODE_UUID)?;
        let scheme = self.require(columns::STORE_PROTOCOL)?;
        let address = self.require(columns::STORE_IDENTIFIER)?;
        Ok(Identity::new(StoreRef::new(scheme, address), id))
    }

    /// The service reports the primary flag as a string
    pub fn is_primary(&self) -> bool {
        matches!(self.get(columns::IS_PRIMARY), Some(v) if v.eq_ignore_ascii_case("true"))
    }

    pub fn nth_sibling(&self) -> Result<Option<i64>, RemoteError> {
        match self.get(columns::NTH_SIBLING) {
            None => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                RemoteError::malformed(format!("nthSibling is not an integer: '{}'", raw))
            }),
        }
    }
}

/// Rows returned by a relation query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }
}

/// Which end of an association the queried node sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationDirection {
    Source,
    Target,
}

/// Restricts an association query; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationFilter {
    pub association_type: Option<String>,
    pub direction: Option<AssociationDirection>,
}

/// Content metadata for one content property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub length: Option<u64>,
    pub mimetype: Option<String>,
    pub encoding: Option<String>,
    pub url: Option<String>,
}

/// Reference to a version node issued by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub identity: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Result of a successful batch submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Temporary id → server-assigned id for every create in the batch
    pub id_map: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_identity_from_row() {
        let identity = Identity::new(StoreRef::spaces_store(), "child-1");
        let row = ResultRow::new()
            .with_peer(&identity)
            .with(columns::IS_PRIMARY, "true")
            .with(columns::NTH_SIBLING, "2");

        assert_eq!(row.peer_identity().unwrap(), identity);
        assert!(row.is_primary());
        assert_eq!(row.nth_sibling().unwrap(), Some(2));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let row = ResultRow::new().with(columns::NODE_UUID, "x");
        let err = row.peer_identity().unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
        assert!(err.to_string().contains("store-protocol"));
    }

    #[test]
    fn test_primary_flag_defaults_false() {
        assert!(!ResultRow::new().is_primary());
        assert!(!ResultRow::new().with(columns::IS_PRIMARY, "false").is_primary());
        assert!(ResultRow::new().with(columns::IS_PRIMARY, "TRUE").is_primary());
    }

    #[test]
    fn test_property_record_multi_value() {
        let single = PropertyRecord::new("cm:title", serde_json::json!("t"));
        let multi = PropertyRecord::new("cm:taggable", serde_json::json!(["a", "b"]));
        assert!(!single.is_multi_value);
        assert!(multi.is_multi_value);
    }
}
