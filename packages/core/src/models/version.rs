//! Version references

use crate::models::{Identity, NodeRef};

/// A version snapshot of a node, itself addressable as a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Registry handle of the version node
    pub node: NodeRef,
    pub identity: Identity,
    /// Label the repository assigned, e.g. `1.1`
    pub label: Option<String>,
    /// The node the version was taken of
    pub versioned: NodeRef,
}
