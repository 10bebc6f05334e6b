//! Error types for graph operations
//!
//! Every session operation (population, mutation, save, versioning, content
//! access) reports failures through [`GraphError`]. Validation and
//! precondition failures are raised before any remote call is issued; remote
//! failures are passed through unmodified.

use crate::models::NodeRef;
use crate::remote::RemoteError;
use thiserror::Error;

/// Errors that can occur while working with the node graph
///
/// # Examples
///
/// ```rust
/// use repograph_core::operations::GraphError;
///
/// let err = GraphError::validation("mimetype must be set before saving content");
/// assert!(err.is_validation());
///
/// let err = GraphError::precondition("node has unsaved changes");
/// assert_eq!(err.to_string(), "Precondition failed: node has unsaved changes");
/// ```
#[derive(Error, Debug)]
pub enum GraphError {
    /// Local state cannot be turned into a valid batch
    ///
    /// Raised before submission; nothing has been sent and nothing changed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation requires a state the node is not in
    ///
    /// e.g. versioning a node with unsaved changes, or attaching a second
    /// primary parent.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A read, query, submission or transfer failed on the remote side
    #[error("Remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// A node handle or property this session does not know
    #[error("Not found: {0}")]
    NotFound(String),

    /// The repository model has no defined semantics for the request
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Local file access for a content payload failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Create a Validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a Precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a NotFound error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// NotFound error for a handle that does not belong to the session
    pub fn unknown_node(node: NodeRef) -> Self {
        Self::NotFound(format!("node {} is not registered in this session", node))
    }

    /// Create an Unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Result alias used by every session operation
pub type Result<T> = std::result::Result<T, GraphError>;
