//! Change Statements
//!
//! A save turns the pending edits of every participating node into statements,
//! grouped by kind and submitted to the service in a single batch call.
//!
//! # Forward references
//!
//! Nodes created in the same batch have no server id yet. Statements address
//! them through [`Predicate::PendingId`] carrying the session-local temporary id;
//! the service resolves these against the `create` statements of the same batch
//! and reports the final ids back in the identifier map.
//!
//! # Kinds
//!
//! Exactly eight kinds exist: `create`, `update`, `writeContent`, `addAspect`,
//! `removeAspect`, `addChild`, `removeChild`, `createAssociation`. Within a kind,
//! statements keep the order in which nodes contributed them.

use crate::models::Identity;
use crate::remote::PropertyRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses the node a statement applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    /// Persisted node, addressed by its full identity
    Node(Identity),
    /// Node created earlier in the same batch, addressed by its temporary id
    PendingId(String),
}

impl Predicate {
    pub fn is_pending(&self) -> bool {
        matches!(self, Predicate::PendingId(_))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Node(identity) => write!(f, "{}", identity),
            Predicate::PendingId(id) => write!(f, "pending:{}", id),
        }
    }
}

/// Primary parent of a node being created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentLink {
    pub parent: Predicate,
    pub association_type: String,
    pub child_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatement {
    /// Temporary id the rest of the batch refers to this node by
    pub id: String,
    pub parent: ParentLink,
    #[serde(rename = "type")]
    pub node_type: String,
    pub properties: Vec<PropertyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatement {
    #[serde(rename = "where")]
    pub target: Predicate,
    pub properties: Vec<PropertyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFormat {
    pub mimetype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteContentStatement {
    #[serde(rename = "where")]
    pub target: Predicate,
    pub property: String,
    pub content: Vec<u8>,
    pub format: ContentFormat,
}

/// Shared shape of `addAspect` and `removeAspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectStatement {
    #[serde(rename = "where")]
    pub target: Predicate,
    pub aspect: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChildStatement {
    #[serde(rename = "where")]
    pub parent: Predicate,
    #[serde(rename = "to")]
    pub child: Predicate,
    pub association_type: String,
    pub child_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveChildStatement {
    #[serde(rename = "from")]
    pub parent: Predicate,
    #[serde(rename = "where")]
    pub child: Predicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssociationStatement {
    pub from: Predicate,
    pub to: Predicate,
    #[serde(rename = "association")]
    pub association_type: String,
}

/// Statement kinds, in the order the service applies them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatementKind {
    Create,
    Update,
    WriteContent,
    AddAspect,
    RemoveAspect,
    AddChild,
    RemoveChild,
    CreateAssociation,
}

impl StatementKind {
    pub const ALL: [StatementKind; 8] = [
        StatementKind::Create,
        StatementKind::Update,
        StatementKind::WriteContent,
        StatementKind::AddAspect,
        StatementKind::RemoveAspect,
        StatementKind::AddChild,
        StatementKind::RemoveChild,
        StatementKind::CreateAssociation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Create => "create",
            StatementKind::Update => "update",
            StatementKind::WriteContent => "writeContent",
            StatementKind::AddAspect => "addAspect",
            StatementKind::RemoveAspect => "removeAspect",
            StatementKind::AddChild => "addChild",
            StatementKind::RemoveChild => "removeChild",
            StatementKind::CreateAssociation => "createAssociation",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All statements of one batch, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statements {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<CreateStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<UpdateStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_content: Vec<WriteContentStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_aspect: Vec<AspectStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_aspect: Vec<AspectStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_child: Vec<AddChildStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove_child: Vec<RemoveChildStatement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create_association: Vec<CreateAssociationStatement>,
}

impl Statements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: StatementKind) -> usize {
        match kind {
            StatementKind::Create => self.create.len(),
            StatementKind::Update => self.update.len(),
            StatementKind::WriteContent => self.write_content.len(),
            StatementKind::AddAspect => self.add_aspect.len(),
            StatementKind::RemoveAspect => self.remove_aspect.len(),
            StatementKind::AddChild => self.add_child.len(),
            StatementKind::RemoveChild => self.remove_child.len(),
            StatementKind::CreateAssociation => self.create_association.len(),
        }
    }

    pub fn len(&self) -> usize {
        StatementKind::ALL.iter().map(|kind| self.count(*kind)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Non-empty kinds with their statement counts, for logging
    pub fn summary(&self) -> String {
        StatementKind::ALL
            .iter()
            .filter(|kind| self.count(**kind) > 0)
            .map(|kind| format!("{}={}", kind, self.count(*kind)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StoreRef;

    #[test]
    fn test_statement_counts() {
        let mut statements = Statements::new();
        assert!(statements.is_empty());

        statements.add_aspect.push(AspectStatement {
            target: Predicate::PendingId("tmp-1".to_string()),
            aspect: "{http://www.alfresco.org/model/content/1.0}titled".to_string(),
        });
        statements.remove_child.push(RemoveChildStatement {
            parent: Predicate::Node(Identity::new(StoreRef::spaces_store(), "p")),
            child: Predicate::Node(Identity::new(StoreRef::spaces_store(), "c")),
        });

        assert_eq!(statements.len(), 2);
        assert_eq!(statements.count(StatementKind::AddAspect), 1);
        assert_eq!(statements.count(StatementKind::Create), 0);
        assert_eq!(statements.summary(), "addAspect=1, removeChild=1");
    }

    #[test]
    fn test_statements_serialize_by_kind() {
        let mut statements = Statements::new();
        statements.update.push(UpdateStatement {
            target: Predicate::Node(Identity::new(StoreRef::spaces_store(), "n1")),
            properties: vec![PropertyRecord::new("cm:title", serde_json::json!("Hello"))],
        });

        let json = serde_json::to_value(&statements).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.keys().collect::<Vec<_>>(), vec!["update"]);
        assert_eq!(json["update"][0]["where"]["node"]["uuid"], "n1");
        assert_eq!(json["update"][0]["properties"][0]["isMultiValue"], false);
    }

    #[test]
    fn test_pending_predicate_display() {
        assert_eq!(
            Predicate::PendingId("tmp-a-1".to_string()).to_string(),
            "pending:tmp-a-1"
        );
    }
}
