//! Node Registry - Identity Map
//!
//! Guarantees a single live [`NodeState`] per [`Identity`] within one session,
//! so edits made through one traversal path are visible through every other.
//! Nodes live in an arena and are addressed by [`NodeRef`] slot indices, which
//! survive the temp-id → server-id reassignment after a save.
//!
//! The registry performs no remote calls.

use crate::models::{Identity, NodeRef, NodeState, StoreRef};
use crate::operations::{GraphError, Predicate, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

/// Registry ids start at 1; 0 is never issued
static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug)]
pub struct NodeRegistry {
    id: u32,
    nodes: Vec<NodeState>,
    index: HashMap<Identity, NodeRef>,
    /// Distinguishes this session's temporary ids from any other session's
    session_tag: String,
    next_temp_id: u64,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        let mut session_tag = Uuid::new_v4().simple().to_string();
        session_tag.truncate(8);
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            index: HashMap::new(),
            session_tag,
            next_temp_id: 0,
        }
    }

    /// Existing node for `identity`, or a freshly registered unpopulated one
    pub fn get(&mut self, identity: &Identity) -> NodeRef {
        if let Some(existing) = self.index.get(identity) {
            return *existing;
        }
        let handle = NodeRef::new(self.id, self.nodes.len());
        self.nodes
            .push(NodeState::persisted(handle, identity.clone()));
        self.index.insert(identity.clone(), handle);
        handle
    }

    /// Node for `identity` if one is registered; never registers
    pub fn lookup(&self, identity: &Identity) -> Option<NodeRef> {
        self.index.get(identity).copied()
    }

    /// Register a brand-new node under a fresh temporary id
    pub fn create(&mut self, store: StoreRef, node_type: impl Into<String>) -> NodeRef {
        self.next_temp_id += 1;
        let identity = Identity::new(
            store,
            format!("tmp-{}-{}", self.session_tag, self.next_temp_id),
        );
        let handle = NodeRef::new(self.id, self.nodes.len());
        self.nodes
            .push(NodeState::created(handle, identity.clone(), node_type.into()));
        self.index.insert(identity, handle);
        handle
    }

    /// Slot of `node`, provided this registry issued it
    fn slot(&self, node: NodeRef) -> Result<usize> {
        if node.registry() == self.id && node.index() < self.nodes.len() {
            Ok(node.index())
        } else {
            Err(GraphError::unknown_node(node))
        }
    }

    pub fn node(&self, node: NodeRef) -> Result<&NodeState> {
        let slot = self.slot(node)?;
        Ok(&self.nodes[slot])
    }

    pub fn node_mut(&mut self, node: NodeRef) -> Result<&mut NodeState> {
        let slot = self.slot(node)?;
        Ok(&mut self.nodes[slot])
    }

    /// How a statement in the next batch addresses `node`
    pub fn predicate(&self, node: NodeRef) -> Result<Predicate> {
        Ok(self.node(node)?.predicate())
    }

    /// Move a node to a new identity, keeping its handle
    pub fn rekey(&mut self, node: NodeRef, identity: Identity) -> Result<()> {
        let state = self.node_mut(node)?;
        let previous = state.identity().clone();
        state.set_identity(identity.clone());
        self.index.remove(&previous);
        self.index.insert(identity, node);
        Ok(())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeState> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> Identity {
        Identity::new(StoreRef::spaces_store(), id)
    }

    #[test]
    fn test_get_returns_same_handle() {
        let mut registry = NodeRegistry::new();
        let a = registry.get(&identity("n1"));
        let b = registry.get(&identity("n1"));
        let c = registry.get(&identity("n2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(registry.len(), 2);
        assert!(!registry.node(a).unwrap().has_properties());
    }

    #[test]
    fn test_create_allocates_temp_ids() {
        let mut registry = NodeRegistry::new();
        let first = registry.create(StoreRef::spaces_store(), "cm:folder");
        let second = registry.create(StoreRef::spaces_store(), "cm:content");

        let first_state = registry.node(first).unwrap();
        let second_state = registry.node(second).unwrap();
        assert!(first_state.is_new());
        assert!(first_state.identity().id.starts_with("tmp-"));
        assert_ne!(first_state.identity(), second_state.identity());
        assert!(first_state.has_children());
        assert_eq!(
            registry.predicate(first).unwrap(),
            Predicate::PendingId(first_state.identity().id.clone())
        );
    }

    #[test]
    fn test_rekey_moves_index_entry() {
        let mut registry = NodeRegistry::new();
        let node = registry.create(StoreRef::spaces_store(), "cm:folder");
        let temp = registry.node(node).unwrap().identity().clone();

        registry.rekey(node, identity("server-1")).unwrap();

        assert_eq!(registry.lookup(&temp), None);
        assert_eq!(registry.lookup(&identity("server-1")), Some(node));
        assert_eq!(registry.node(node).unwrap().identity().id, "server-1");
    }

    #[test]
    fn test_unknown_handle() {
        let registry = NodeRegistry::new();
        assert!(matches!(
            registry.node(NodeRef::new(0, 7)),
            Err(GraphError::NotFound(_))
        ));
    }

    #[test]
    fn test_handles_are_bound_to_their_registry() {
        let mut first = NodeRegistry::new();
        let mut second = NodeRegistry::new();
        let a = first.get(&identity("a"));
        let b = second.get(&identity("b"));
        assert_eq!(a.index(), b.index());
        assert_ne!(a.registry(), b.registry());

        assert!(matches!(second.node(a), Err(GraphError::NotFound(_))));
        assert!(matches!(first.node_mut(b), Err(GraphError::NotFound(_))));
        assert_eq!(second.node(b).unwrap().identity().id, "b");
    }
}
