//! Graph Session
//!
//! A [`Session`] is the entry point of the graph: it owns the identity map of
//! live nodes, the connection settings, and handles to the remote
//! collaborators. Every node operation goes through it.
//!
//! # Architecture
//!
//! - **Identity map**: [`NodeRegistry`] keeps one [`NodeState`] per identity;
//!   callers hold [`NodeRef`] handles.
//! - **Lazy population**: reads populate the relation kind they touch, once
//!   ([`populate`]).
//! - **Unit of work**: mutations only record pending edits ([`mutate`],
//!   [`content`]); [`Session::save`] sends them as one batch ([`save`]).
//! - **No ambient state**: the ticket and endpoint live in the session's
//!   [`RepositoryConfig`].
//!
//! # Concurrency
//!
//! Mutating methods take `&mut self`, which confines a session to one task at a
//! time. Share one between tasks as `Arc<tokio::sync::Mutex<Session>>`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repograph_core::config::RepositoryConfig;
//! use repograph_core::remote::InMemoryRepository;
//! use repograph_core::session::Session;
//!
//! # async fn example() -> repograph_core::operations::Result<()> {
//! let repository = Arc::new(InMemoryRepository::new());
//! let mut session = Session::new(RepositoryConfig::default(), repository.clone())
//!     .with_transport(repository.clone());
//!
//! let root = session.get(&repository.root());
//! let folder = session.create_child(root, "cm:folder", "cm:contains", "cm:reports")?;
//! session.set_property(folder, "cm:name", "reports").await?;
//!
//! let report = session.save().await?;
//! println!("sent {} statements", report.statement_count);
//! # Ok(())
//! # }
//! ```

pub mod content;
pub mod mutate;
pub mod populate;
pub mod registry;
pub mod save;
pub mod version;

pub use registry::NodeRegistry;
pub use save::SaveReport;

use crate::config::RepositoryConfig;
use crate::models::{Identity, NodeRef, NodeState};
use crate::operations::Result;
use crate::remote::{ContentTransport, NodeRecord, RepositoryService, HttpContentTransport};
use crate::utils::NamespaceMap;
use std::sync::Arc;

/// One logical graph session against a repository
pub struct Session {
    config: RepositoryConfig,
    service: Arc<dyn RepositoryService>,
    transport: Arc<dyn ContentTransport>,
    namespaces: NamespaceMap,
    registry: NodeRegistry,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("connection_url", &self.config.connection_url)
            .field("nodes", &self.registry.len())
            .finish()
    }
}

impl Session {
    /// Session using the HTTP transport for content payloads
    pub fn new(config: RepositoryConfig, service: Arc<dyn RepositoryService>) -> Self {
        Self {
            config,
            service,
            transport: Arc::new(HttpContentTransport::new()),
            namespaces: NamespaceMap::new(),
            registry: NodeRegistry::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn ContentTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_namespaces(mut self, namespaces: NamespaceMap) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn namespaces(&self) -> &NamespaceMap {
        &self.namespaces
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Fully qualified form of a short or qualified name
    pub(crate) fn qualify(&self, name: &str) -> String {
        self.namespaces.get_full_name(name)
    }

    /// Handle of the live node for `identity`, registering it if unseen
    pub fn get(&mut self, identity: &Identity) -> NodeRef {
        self.registry.get(identity)
    }

    /// Handle of a node by bare id in the default store
    pub fn get_by_id(&mut self, id: &str) -> NodeRef {
        let identity = Identity::new(self.config.default_store.clone(), id);
        self.registry.get(&identity)
    }

    /// Register (or find) the node a fetched record describes and populate its
    /// properties from the record unless they are already populated
    pub fn adopt(&mut self, record: NodeRecord) -> NodeRef {
        let node = self.registry.get(&record.identity);
        if let Ok(state) = self.registry.node_mut(node) {
            if !state.has_properties() {
                state.apply_record(record);
            }
        }
        node
    }

    pub fn node(&self, node: NodeRef) -> Result<&NodeState> {
        self.registry.node(node)
    }

    pub fn identity(&self, node: NodeRef) -> Result<&Identity> {
        Ok(self.registry.node(node)?.identity())
    }

    pub fn is_new_node(&self, node: NodeRef) -> Result<bool> {
        Ok(self.registry.node(node)?.is_new())
    }

    /// Pure check over the node's pending edits; never populates
    pub fn is_dirty(&self, node: NodeRef) -> Result<bool> {
        Ok(self.registry.node(node)?.is_dirty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyValue;
    use crate::remote::{InMemoryRepository, RepositoryService};

    fn session_over(repository: &Arc<InMemoryRepository>) -> Session {
        Session::new(RepositoryConfig::default(), repository.clone())
            .with_transport(repository.clone())
    }

    #[test]
    fn test_adopt_populates_from_record() {
        let repository = Arc::new(InMemoryRepository::new());
        let mut session = session_over(&repository);
        let record = tokio_test::block_on(repository.read_node(&repository.root())).unwrap();

        let node = session.adopt(record);
        assert_eq!(node, session.get(&repository.root()));
        assert!(session.node(node).unwrap().has_properties());
        assert!(!session.is_dirty(node).unwrap());

        // already-populated nodes keep their local edits
        tokio_test::block_on(session.set_property(node, "cm:title", "root")).unwrap();
        let record = tokio_test::block_on(repository.read_node(&repository.root())).unwrap();
        session.adopt(record);
        assert_eq!(
            session.node(node).unwrap().properties().unwrap().get(&session.qualify("cm:title")),
            Some(&PropertyValue::from("root"))
        );
    }

    #[test]
    fn test_get_by_id_uses_default_store() {
        let repository = Arc::new(InMemoryRepository::new());
        let mut session = session_over(&repository);
        let root = repository.root();

        assert_eq!(session.get_by_id(&root.id), session.get(&root));
        assert_eq!(session.registry().len(), 1);
    }

    #[test]
    fn test_unknown_handle_is_not_found() {
        let repository = Arc::new(InMemoryRepository::new());
        let session = session_over(&repository);
        assert!(matches!(
            session.is_dirty(NodeRef::new(0, 3)),
            Err(crate::operations::GraphError::NotFound(_))
        ));
    }
}
