//! Lazy Population
//!
//! Each relation kind of a node is fetched on first access with exactly one
//! remote call: properties (with type, path and aspects), children, parents,
//! associations. New nodes never fetch. Responses are parsed completely before
//! anything is assigned, so a failed or malformed response leaves the node
//! unpopulated and the read can be retried.

use crate::models::{Association, ChildAssociation, Identity, NodeRef, PropertyValue};
use crate::operations::{GraphError, Result};
use crate::remote::{columns, AssociationDirection, AssociationFilter, RemoteError, ResultSet};
use crate::session::Session;
use std::collections::{BTreeMap, BTreeSet};

/// One parsed child-association row
struct EdgeRow {
    peer: Identity,
    association_type: String,
    name: String,
    is_primary: bool,
    nth_sibling: Option<i64>,
}

fn parse_edge_rows(result: &ResultSet) -> std::result::Result<Vec<EdgeRow>, RemoteError> {
    result
        .rows
        .iter()
        .map(|row| -> std::result::Result<EdgeRow, RemoteError> {
            Ok(EdgeRow {
                peer: row.peer_identity()?,
                association_type: row.require(columns::ASSOCIATION_TYPE)?.to_string(),
                name: row.require(columns::ASSOCIATION_NAME)?.to_string(),
                is_primary: row.is_primary(),
                nth_sibling: row.nth_sibling()?,
            })
        })
        .collect()
}

impl Session {
    /// Populate type, path, aspects and properties if not yet populated
    pub async fn populate_properties(&mut self, node: NodeRef) -> Result<()> {
        let state = self.registry.node(node)?;
        if state.is_new() || state.has_properties() {
            return Ok(());
        }
        let identity = state.identity().clone();

        tracing::debug!("Populating properties of {}", identity);
        let record = self.service.read_node(&identity).await?;
        self.registry.node_mut(node)?.apply_record(record);
        Ok(())
    }

    pub async fn populate_children(&mut self, node: NodeRef) -> Result<()> {
        let state = self.registry.node(node)?;
        if state.is_new() || state.has_children() {
            return Ok(());
        }
        let identity = state.identity().clone();

        tracing::debug!("Populating children of {}", identity);
        let result = self.service.query_children(&identity).await?;
        let rows = parse_edge_rows(&result)?;

        let mut children = BTreeMap::new();
        for row in rows {
            let child = self.registry.get(&row.peer);
            let edge = ChildAssociation::new(node, child, row.association_type, row.name, row.is_primary)
                .with_nth_sibling(row.nth_sibling);
            children.insert(child, edge);
        }
        self.registry.node_mut(node)?.apply_children(children);
        Ok(())
    }

    /// Populate parents and the primary parent
    pub async fn populate_parents(&mut self, node: NodeRef) -> Result<()> {
        let state = self.registry.node(node)?;
        if state.is_new() || state.has_parents() {
            return Ok(());
        }
        let identity = state.identity().clone();

        tracing::debug!("Populating parents of {}", identity);
        let result = self.service.query_parents(&identity).await?;
        let rows = parse_edge_rows(&result)?;

        let mut parents = BTreeMap::new();
        let mut primary_parent = None;
        for row in rows {
            let parent = self.registry.get(&row.peer);
            if row.is_primary {
                primary_parent = Some(parent);
            }
            let edge = ChildAssociation::new(parent, node, row.association_type, row.name, row.is_primary)
                .with_nth_sibling(row.nth_sibling);
            parents.insert(parent, edge);
        }
        self.registry
            .node_mut(node)?
            .apply_parents(parents, primary_parent);
        Ok(())
    }

    /// Populate outgoing associations
    pub async fn populate_associations(&mut self, node: NodeRef) -> Result<()> {
        let state = self.registry.node(node)?;
        if state.is_new() || state.has_associations() {
            return Ok(());
        }
        let identity = state.identity().clone();

        tracing::debug!("Populating associations of {}", identity);
        let filter = AssociationFilter {
            association_type: None,
            direction: Some(AssociationDirection::Target),
        };
        let result = self.service.query_associated(&identity, &filter).await?;
        let rows = result
            .rows
            .iter()
            .map(|row| -> std::result::Result<(Identity, String), RemoteError> {
                Ok((
                    row.peer_identity()?,
                    row.require(columns::ASSOCIATION_TYPE)?.to_string(),
                ))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut associations = BTreeMap::new();
        for (peer, association_type) in rows {
            let target = self.registry.get(&peer);
            let association = Association::new(node, target, association_type);
            associations.insert((target, association.association_type().to_string()), association);
        }
        self.registry
            .node_mut(node)?
            .apply_associations(associations);
        Ok(())
    }

    // ---- read API ----

    pub async fn node_type(&mut self, node: NodeRef) -> Result<Option<String>> {
        self.populate_properties(node).await?;
        Ok(self.registry.node(node)?.node_type().map(str::to_string))
    }

    pub async fn path(&mut self, node: NodeRef) -> Result<Option<String>> {
        self.populate_properties(node).await?;
        Ok(self.registry.node(node)?.path().map(str::to_string))
    }

    pub async fn aspects(&mut self, node: NodeRef) -> Result<BTreeSet<String>> {
        self.populate_properties(node).await?;
        Ok(self
            .registry
            .node(node)?
            .aspects()
            .cloned()
            .unwrap_or_default())
    }

    pub async fn has_aspect(&mut self, node: NodeRef, aspect: &str) -> Result<bool> {
        let aspect = self.qualify(aspect);
        Ok(self.aspects(node).await?.contains(&aspect))
    }

    pub async fn properties(&mut self, node: NodeRef) -> Result<&BTreeMap<String, PropertyValue>> {
        self.populate_properties(node).await?;
        let state = self.registry.node(node)?;
        state.properties().ok_or_else(|| {
            GraphError::not_found(format!("properties of {} are unavailable", state.identity()))
        })
    }

    /// Property by short or fully qualified name
    pub async fn get_property(
        &mut self,
        node: NodeRef,
        name: &str,
    ) -> Result<Option<&PropertyValue>> {
        let name = self.qualify(name);
        Ok(self.properties(node).await?.get(&name))
    }

    /// Effective children: persisted, minus pending removals, plus pending additions
    pub async fn children(&mut self, node: NodeRef) -> Result<Vec<ChildAssociation>> {
        self.populate_children(node).await?;
        Ok(self.registry.node(node)?.children())
    }

    pub async fn parents(&mut self, node: NodeRef) -> Result<Vec<ChildAssociation>> {
        self.populate_parents(node).await?;
        Ok(self.registry.node(node)?.parents())
    }

    pub async fn primary_parent(&mut self, node: NodeRef) -> Result<Option<NodeRef>> {
        self.populate_parents(node).await?;
        Ok(self.registry.node(node)?.primary_parent())
    }

    pub async fn associations(&mut self, node: NodeRef) -> Result<Vec<Association>> {
        self.populate_associations(node).await?;
        Ok(self.registry.node(node)?.associations())
    }

    /// Scalar properties changed since population; never populates
    pub fn modified_properties(
        &self,
        node: NodeRef,
    ) -> Result<BTreeMap<String, serde_json::Value>> {
        Ok(self.registry.node(node)?.modified_properties())
    }
}
