//! Relation Records
//!
//! Immutable descriptions of one edge in the repository graph:
//!
//! - [`ChildAssociation`] - hierarchical parent → child edge; exactly one per child
//!   is primary and fixes the child's location
//! - [`Association`] - plain typed edge between two nodes

use crate::models::NodeRef;

/// Hierarchical parent → child edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildAssociation {
    parent: NodeRef,
    child: NodeRef,
    association_type: String,
    name: String,
    is_primary: bool,
    nth_sibling: Option<i64>,
}

impl ChildAssociation {
    pub fn new(
        parent: NodeRef,
        child: NodeRef,
        association_type: impl Into<String>,
        name: impl Into<String>,
        is_primary: bool,
    ) -> Self {
        Self {
            parent,
            child,
            association_type: association_type.into(),
            name: name.into(),
            is_primary,
            nth_sibling: None,
        }
    }

    /// Attach the sibling ordinal reported by the repository
    pub fn with_nth_sibling(mut self, nth_sibling: Option<i64>) -> Self {
        self.nth_sibling = nth_sibling;
        self
    }

    pub fn parent(&self) -> NodeRef {
        self.parent
    }

    pub fn child(&self) -> NodeRef {
        self.child
    }

    pub fn association_type(&self) -> &str {
        &self.association_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn nth_sibling(&self) -> Option<i64> {
        self.nth_sibling
    }

    /// True when both records describe the same parent/child/type/name edge,
    /// regardless of the ordinal the server attached
    pub fn same_edge(&self, other: &ChildAssociation) -> bool {
        self.parent == other.parent
            && self.child == other.child
            && self.association_type == other.association_type
            && self.name == other.name
    }
}

/// Non-hierarchical typed edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    from: NodeRef,
    to: NodeRef,
    association_type: String,
}

impl Association {
    pub fn new(from: NodeRef, to: NodeRef, association_type: impl Into<String>) -> Self {
        Self {
            from,
            to,
            association_type: association_type.into(),
        }
    }

    pub fn source(&self) -> NodeRef {
        self.from
    }

    pub fn target(&self) -> NodeRef {
        self.to
    }

    pub fn association_type(&self) -> &str {
        &self.association_type
    }

    /// Key the owning node stores this association under
    pub(crate) fn key(&self) -> (NodeRef, String) {
        (self.to, self.association_type.clone())
    }
}
