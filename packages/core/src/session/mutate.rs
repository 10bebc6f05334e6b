//! Mutation API
//!
//! Every mutation populates what it needs, resolves names through the
//! namespace map, and records a pending edit. Nothing is sent until a save.

use crate::models::{
    Association, ChildAssociation, ContentHandle, EdgeRemoval, NodeRef, PropertyValue,
};
use crate::operations::{GraphError, Result};
use crate::session::Session;
use std::collections::BTreeMap;

impl Session {
    /// Overwrite one property
    pub async fn set_property(
        &mut self,
        node: NodeRef,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.populate_properties(node).await?;
        let name = self.qualify(name);
        self.registry.node_mut(node)?.insert_property(name, value.into())
    }

    /// Overwrite each given property; others are left alone
    pub async fn set_properties<I, K, V>(&mut self, node: NodeRef, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PropertyValue>,
    {
        self.populate_properties(node).await?;
        let resolved: Vec<(String, PropertyValue)> = properties
            .into_iter()
            .map(|(name, value)| (self.qualify(name.as_ref()), value.into()))
            .collect();

        let state = self.registry.node_mut(node)?;
        for (name, value) in resolved {
            state.insert_property(name, value)?;
        }
        Ok(())
    }

    /// Replace the whole property map
    ///
    /// Properties absent from `properties` disappear locally; no statement
    /// removes them on the server.
    pub async fn replace_properties<I, K, V>(&mut self, node: NodeRef, properties: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<PropertyValue>,
    {
        self.populate_properties(node).await?;
        let resolved: BTreeMap<String, PropertyValue> = properties
            .into_iter()
            .map(|(name, value)| (self.qualify(name.as_ref()), value.into()))
            .collect();
        self.registry.node_mut(node)?.replace_properties(resolved)
    }

    /// Add an aspect, optionally with its initial properties
    ///
    /// Adding an aspect the node already has is a no-op, properties included.
    pub async fn add_aspect(
        &mut self,
        node: NodeRef,
        aspect: &str,
        properties: Option<BTreeMap<String, PropertyValue>>,
    ) -> Result<()> {
        self.populate_properties(node).await?;
        let aspect = self.qualify(aspect);
        let resolved: Vec<(String, PropertyValue)> = properties
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (self.qualify(&name), value))
            .collect();

        let state = self.registry.node_mut(node)?;
        if !state.add_aspect(&aspect)? {
            return Ok(());
        }
        for (name, value) in resolved {
            state.insert_property(name, value)?;
        }
        Ok(())
    }

    pub async fn remove_aspect(&mut self, node: NodeRef, aspect: &str) -> Result<()> {
        self.populate_properties(node).await?;
        let aspect = self.qualify(aspect);
        self.registry.node_mut(node)?.remove_aspect(&aspect)?;
        Ok(())
    }

    /// Create a new node as the primary child of `parent`
    ///
    /// The child lives in the parent's store and starts with empty,
    /// populated containers.
    pub fn create_child(
        &mut self,
        parent: NodeRef,
        node_type: &str,
        association_type: &str,
        association_name: &str,
    ) -> Result<NodeRef> {
        let store = self.registry.node(parent)?.identity().store.clone();
        let node_type = self.qualify(node_type);
        let association_type = self.qualify(association_type);
        let association_name = self.qualify(association_name);

        let child = self.registry.create(store, node_type);
        let edge = ChildAssociation::new(parent, child, association_type, association_name, true);
        self.registry
            .node_mut(child)?
            .attach_primary_parent(edge.clone())?;
        self.registry.node_mut(parent)?.push_added_child(edge);

        tracing::debug!(
            "Created {} under {}",
            self.registry.node(child)?.identity(),
            self.registry.node(parent)?.identity()
        );
        Ok(child)
    }

    /// Link an existing node as a secondary (non-primary) child
    pub async fn add_child(
        &mut self,
        parent: NodeRef,
        child: NodeRef,
        association_type: &str,
        association_name: &str,
    ) -> Result<ChildAssociation> {
        self.registry.node(child)?;
        self.populate_children(parent).await?;

        let edge = ChildAssociation::new(
            parent,
            child,
            self.qualify(association_type),
            self.qualify(association_name),
            false,
        );
        if self.registry.node(parent)?.has_child_edge(&edge) {
            return Ok(edge);
        }
        self.registry.node_mut(parent)?.push_added_child(edge.clone());
        self.registry.node_mut(child)?.push_added_parent(edge.clone());
        Ok(edge)
    }

    /// Remove a child edge
    ///
    /// An edge added in this session and not yet saved is purged from both
    /// sides and produces no statement. The primary edge of a node created in
    /// this session cannot be removed before that node is saved: the node
    /// would be left without a parent to be created under.
    pub async fn remove_child(&mut self, association: &ChildAssociation) -> Result<()> {
        let parent = association.parent();
        self.populate_children(parent).await?;

        if self
            .registry
            .node(parent)?
            .is_pending_primary_child(association)
        {
            return Err(GraphError::precondition(format!(
                "{} is the primary parent of unsaved node {}",
                self.registry.node(parent)?.identity(),
                self.registry.node(association.child())?.identity()
            )));
        }

        match self.registry.node_mut(parent)?.remove_child_edge(association) {
            EdgeRemoval::Purged(edge) => {
                self.registry
                    .node_mut(edge.child())?
                    .purge_added_parent(&edge);
                Ok(())
            }
            EdgeRemoval::Persisted(_) => Ok(()),
            EdgeRemoval::Missing => Err(GraphError::not_found(format!(
                "{} is not a child of {}",
                self.registry.node(association.child())?.identity(),
                self.registry.node(parent)?.identity()
            ))),
        }
    }

    /// Add a plain association from `source` to `target`
    pub async fn add_association(
        &mut self,
        source: NodeRef,
        target: NodeRef,
        association_type: &str,
    ) -> Result<Association> {
        self.registry.node(target)?;
        self.populate_associations(source).await?;

        let association = Association::new(source, target, self.qualify(association_type));
        let state = self.registry.node_mut(source)?;
        if !state.has_association(&association) {
            state.push_added_association(association.clone());
        }
        Ok(association)
    }

    /// Remove a plain association
    ///
    /// Only associations added in this session and not yet saved can be
    /// removed; persisted ones yield [`GraphError::Unsupported`].
    pub async fn remove_association(&mut self, association: &Association) -> Result<()> {
        let source = association.source();
        self.populate_associations(source).await?;

        match self.registry.node_mut(source)?.remove_association(association) {
            EdgeRemoval::Purged(_) => Ok(()),
            EdgeRemoval::Persisted(_) => Err(GraphError::unsupported(format!(
                "removing persisted association '{}' from {}",
                association.association_type(),
                self.registry.node(source)?.identity()
            ))),
            EdgeRemoval::Missing => Err(GraphError::not_found(format!(
                "no '{}' association from {} to {}",
                association.association_type(),
                self.registry.node(source)?.identity(),
                self.registry.node(association.target())?.identity()
            ))),
        }
    }

    /// Install a new dirty content handle, superseding the property's value
    pub async fn update_content(
        &mut self,
        node: NodeRef,
        property: &str,
        mimetype: &str,
        encoding: Option<&str>,
        content: Option<Vec<u8>>,
    ) -> Result<()> {
        let mut handle = ContentHandle::new(mimetype, encoding.map(str::to_string));
        if let Some(bytes) = content {
            handle.set_content(bytes);
        }
        self.set_property(node, property, handle).await
    }
}
