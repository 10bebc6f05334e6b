//! RepositoryService Trait - Remote Repository Abstraction
//!
//! This module defines the `RepositoryService` trait that abstracts the remote
//! request/response endpoint the graph talks to. The graph layer never knows
//! how calls travel; it only issues them and interprets the records that come
//! back.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: every call is a network round trip and is awaited to
//!    completion or failure. No call is issued in the background.
//! 2. **One call per need**: each relation kind populates with exactly one call;
//!    a save is exactly one `submit_batch` call.
//! 3. **Atomic batches**: `submit_batch` either applies every statement or none.
//!
//! # Examples
//!
//! ```rust,no_run
//! use repograph_core::remote::{InMemoryRepository, RepositoryService};
//!
//! # async fn example() -> Result<(), repograph_core::remote::RemoteError> {
//! let repository = InMemoryRepository::new();
//! let record = repository.read_node(&repository.root()).await?;
//! println!("root is a {}", record.node_type);
//! # Ok(())
//! # }
//! ```

use crate::models::Identity;
use crate::operations::Statements;
use crate::remote::{
    AssociationFilter, BatchOutcome, ContentRecord, NodeRecord, RemoteError, ResultSet,
    VersionInfo,
};
use async_trait::async_trait;

/// Remote repository operations consumed by the graph
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so a session holding one can move
/// between tasks.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    /// Read type, path, aspects and properties of one node
    async fn read_node(&self, node: &Identity) -> Result<NodeRecord, RemoteError>;

    /// Child associations where `node` is the parent; one row per child
    async fn query_children(&self, node: &Identity) -> Result<ResultSet, RemoteError>;

    /// Child associations where `node` is the child; one row per parent
    async fn query_parents(&self, node: &Identity) -> Result<ResultSet, RemoteError>;

    /// Plain associations touching `node`, restricted by `filter`
    async fn query_associated(
        &self,
        node: &Identity,
        filter: &AssociationFilter,
    ) -> Result<ResultSet, RemoteError>;

    /// Content metadata of one content property; `None` when the property holds no content
    async fn read_content(
        &self,
        node: &Identity,
        property: &str,
    ) -> Result<Option<ContentRecord>, RemoteError>;

    /// Apply a whole batch atomically and report the identifier map
    async fn submit_batch(&self, statements: &Statements) -> Result<BatchOutcome, RemoteError>;

    /// Snapshot `node` into its version history
    async fn create_version(
        &self,
        node: &Identity,
        description: Option<&str>,
        major: bool,
    ) -> Result<VersionInfo, RemoteError>;
}
