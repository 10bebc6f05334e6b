//! Repograph Core - Client-Side Repository Object Graph
//!
//! This crate presents the nodes of a remote content repository as a lazily
//! populated, change-tracked object graph. Edits are recorded locally and sent
//! to the repository in one batch per save.
//!
//! # Architecture
//!
//! - **Identity map**: one live node per repository identity per session
//! - **Lazy population**: properties, children, parents and associations are
//!   fetched independently, on first access, with one remote call each
//! - **Unit of work**: mutations are pending until [`Session::save`], which
//!   submits a single batch and reconciles temporary identifiers
//! - **Pluggable remote**: [`RepositoryService`] and [`ContentTransport`] are
//!   async traits; [`InMemoryRepository`] implements both for tests and tools
//!
//! # Modules
//!
//! - [`models`] - identities, relations, property values, node state
//! - [`session`] - the session, identity map and node operations
//! - [`operations`] - statements, batch building, error taxonomy
//! - [`remote`] - service and transport traits with their implementations
//! - [`config`] - connection settings
//! - [`utils`] - namespace prefix handling

pub mod config;
pub mod models;
pub mod operations;
pub mod remote;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::RepositoryConfig;
pub use models::{
    Association, ChildAssociation, ContentHandle, Identity, NodeRef, PropertyValue, StoreRef,
    Version,
};
pub use operations::{GraphError, Result};
pub use remote::{ContentTransport, InMemoryRepository, RepositoryService, HttpContentTransport};
pub use session::{SaveReport, Session};
pub use utils::NamespaceMap;
