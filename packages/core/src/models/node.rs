//! Node State - Change-Tracked Repository Node
//!
//! [`NodeState`] is the client-side record of one repository node: its type,
//! properties, aspects and relations, each populated independently, plus the
//! pending edits accumulated since the last population or save.
//!
//! # Population
//!
//! Every relation kind is `None` until populated. New nodes start with every
//! container populated and empty, since the server has nothing to report for
//! them. Population is driven by the owning session; this type only applies
//! already-parsed results.
//!
//! # Change tracking
//!
//! - Properties are compared against `original_properties`, the snapshot taken
//!   at population or save time.
//! - Aspects are applied to the live set directly and recorded as pending
//!   adds/removes.
//! - Relation edits never touch the persisted maps before a save; the effective
//!   view callers see is `persisted ∪ added` minus pending removals.
//!
//! # Save protocol
//!
//! `on_before_save` appends this node's statements to a batch without
//! mutating anything. `on_after_save` runs only once the batch was accepted and
//! folds the pending edits into the persisted state.

use crate::models::{
    Association, ChildAssociation, ContentHandle, ContentReference, Identity, NodeRef,
    PropertyValue,
};
use crate::operations::{
    AddChildStatement, AspectStatement, CreateAssociationStatement, CreateStatement, GraphError,
    ParentLink, Predicate, RemoveChildStatement, Result, Statements, UpdateStatement, Uploader,
};
use crate::remote::{NodeRecord, PropertyRecord};
use crate::session::NodeRegistry;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of removing an edge from a node's effective relation set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeRemoval<T> {
    /// The edge was only pending; it was dropped and produces no statement
    Purged(T),
    /// The edge is persisted; child edges are now pending removal
    Persisted(T),
    /// No such edge in the effective set
    Missing,
}

/// Client-side state of one repository node
#[derive(Debug, Clone)]
pub struct NodeState {
    handle: NodeRef,
    identity: Identity,
    is_new: bool,
    node_type: Option<String>,
    path: Option<String>,

    properties: Option<BTreeMap<String, PropertyValue>>,
    original_properties: BTreeMap<String, PropertyValue>,
    /// Raw content reference strings of content-valued properties
    content_refs: BTreeMap<String, String>,
    aspects: Option<BTreeSet<String>>,

    children: Option<BTreeMap<NodeRef, ChildAssociation>>,
    parents: Option<BTreeMap<NodeRef, ChildAssociation>>,
    associations: Option<BTreeMap<(NodeRef, String), Association>>,
    primary_parent: Option<NodeRef>,

    added_aspects: BTreeSet<String>,
    removed_aspects: BTreeSet<String>,
    added_children: Vec<ChildAssociation>,
    removed_children: Vec<ChildAssociation>,
    added_parents: Vec<ChildAssociation>,
    added_associations: Vec<Association>,
}

impl NodeState {
    /// Unpopulated state for a node known to exist on the server
    pub(crate) fn persisted(handle: NodeRef, identity: Identity) -> Self {
        Self {
            handle,
            identity,
            is_new: false,
            node_type: None,
            path: None,
            properties: None,
            original_properties: BTreeMap::new(),
            content_refs: BTreeMap::new(),
            aspects: None,
            children: None,
            parents: None,
            associations: None,
            primary_parent: None,
            added_aspects: BTreeSet::new(),
            removed_aspects: BTreeSet::new(),
            added_children: Vec::new(),
            removed_children: Vec::new(),
            added_parents: Vec::new(),
            added_associations: Vec::new(),
        }
    }

    /// Empty, fully populated state for a node that does not exist yet
    pub(crate) fn created(handle: NodeRef, identity: Identity, node_type: String) -> Self {
        Self {
            is_new: true,
            node_type: Some(node_type),
            properties: Some(BTreeMap::new()),
            aspects: Some(BTreeSet::new()),
            children: Some(BTreeMap::new()),
            parents: Some(BTreeMap::new()),
            associations: Some(BTreeMap::new()),
            ..Self::persisted(handle, identity)
        }
    }

    // ---- identity ----

    pub fn handle(&self) -> NodeRef {
        self.handle
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }

    /// How statements address this node: pending id while new, identity after
    pub fn predicate(&self) -> Predicate {
        if self.is_new {
            Predicate::PendingId(self.identity.id.clone())
        } else {
            Predicate::Node(self.identity.clone())
        }
    }

    // ---- population ----

    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn properties(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        self.properties.as_ref()
    }

    pub fn original_properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.original_properties
    }

    pub fn aspects(&self) -> Option<&BTreeSet<String>> {
        self.aspects.as_ref()
    }

    pub fn has_properties(&self) -> bool {
        self.properties.is_some()
    }

    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }

    pub fn has_parents(&self) -> bool {
        self.parents.is_some()
    }

    pub fn has_associations(&self) -> bool {
        self.associations.is_some()
    }

    /// Raw reference string a content property was populated from
    pub fn content_reference(&self, property: &str) -> Option<&str> {
        self.content_refs.get(property).map(String::as_str)
    }

    /// Apply a node read: type, path, aspects, properties and the snapshot
    pub(crate) fn apply_record(&mut self, record: NodeRecord) {
        let mut properties = BTreeMap::new();
        let mut content_refs = BTreeMap::new();

        for PropertyRecord { name, value, .. } in record.properties {
            match value {
                Value::String(raw) if ContentReference::is_reference(&raw) => {
                    properties.insert(
                        name.clone(),
                        PropertyValue::Content(ContentHandle::unpopulated(self.handle, &name)),
                    );
                    content_refs.insert(name, raw);
                }
                other => {
                    properties.insert(name, PropertyValue::Scalar(other));
                }
            }
        }

        self.node_type = Some(record.node_type);
        self.path = record.path;
        self.aspects = Some(record.aspects.into_iter().collect());
        self.original_properties = properties.clone();
        self.properties = Some(properties);
        self.content_refs = content_refs;
    }

    pub(crate) fn apply_children(&mut self, children: BTreeMap<NodeRef, ChildAssociation>) {
        self.children = Some(children);
    }

    pub(crate) fn apply_parents(
        &mut self,
        parents: BTreeMap<NodeRef, ChildAssociation>,
        primary_parent: Option<NodeRef>,
    ) {
        self.parents = Some(parents);
        if self.primary_parent.is_none() {
            self.primary_parent = primary_parent;
        }
    }

    pub(crate) fn apply_associations(
        &mut self,
        associations: BTreeMap<(NodeRef, String), Association>,
    ) {
        self.associations = Some(associations);
    }

    /// Drop cached properties and aspects so they are read again
    pub(crate) fn invalidate_properties(&mut self) {
        if self.is_new {
            return;
        }
        self.properties = None;
        self.aspects = None;
        self.original_properties.clear();
        self.content_refs.clear();
    }

    // ---- effective relation views ----

    /// Persisted children not pending removal, followed by pending additions
    pub fn children(&self) -> Vec<ChildAssociation> {
        let mut effective: Vec<ChildAssociation> = self
            .children
            .iter()
            .flat_map(|children| children.values())
            .filter(|edge| !self.removed_children.iter().any(|r| r.same_edge(edge)))
            .cloned()
            .collect();
        effective.extend(self.added_children.iter().cloned());
        effective
    }

    pub fn parents(&self) -> Vec<ChildAssociation> {
        let mut effective: Vec<ChildAssociation> = self
            .parents
            .iter()
            .flat_map(|parents| parents.values())
            .cloned()
            .collect();
        let pending: Vec<ChildAssociation> = self
            .added_parents
            .iter()
            .filter(|edge| !effective.iter().any(|e| e.same_edge(edge)))
            .cloned()
            .collect();
        effective.extend(pending);
        effective
    }

    pub fn associations(&self) -> Vec<Association> {
        let mut effective: Vec<Association> = self
            .associations
            .iter()
            .flat_map(|associations| associations.values())
            .cloned()
            .collect();
        effective.extend(self.added_associations.iter().cloned());
        effective
    }

    pub fn primary_parent(&self) -> Option<NodeRef> {
        self.primary_parent
    }

    // ---- pending edits ----

    pub fn added_aspects(&self) -> &BTreeSet<String> {
        &self.added_aspects
    }

    pub fn removed_aspects(&self) -> &BTreeSet<String> {
        &self.removed_aspects
    }

    pub fn added_children(&self) -> &[ChildAssociation] {
        &self.added_children
    }

    pub fn removed_children(&self) -> &[ChildAssociation] {
        &self.removed_children
    }

    pub fn added_parents(&self) -> &[ChildAssociation] {
        &self.added_parents
    }

    pub fn added_associations(&self) -> &[Association] {
        &self.added_associations
    }

    /// Scalar properties that are new or differ from the snapshot
    ///
    /// Content-valued properties are never part of the delta.
    pub fn modified_properties(&self) -> BTreeMap<String, Value> {
        let Some(properties) = &self.properties else {
            return BTreeMap::new();
        };

        properties
            .iter()
            .filter_map(|(name, value)| match value {
                PropertyValue::Scalar(scalar) => {
                    let unchanged = matches!(
                        self.original_properties.get(name),
                        Some(PropertyValue::Scalar(original)) if original == scalar
                    );
                    (!unchanged).then(|| (name.clone(), scalar.clone()))
                }
                PropertyValue::Content(_) => None,
            })
            .collect()
    }

    fn has_dirty_content(&self) -> bool {
        self.properties.iter().flat_map(|p| p.values()).any(|value| {
            value
                .as_content()
                .map(ContentHandle::is_dirty)
                .unwrap_or(false)
        })
    }

    /// Whether a save would have anything to send for this node
    pub fn is_dirty(&self) -> bool {
        self.is_new
            || !self.modified_properties().is_empty()
            || !self.added_aspects.is_empty()
            || !self.removed_aspects.is_empty()
            || !self.added_children.is_empty()
            || !self.removed_children.is_empty()
            || !self.added_associations.is_empty()
            || self.has_dirty_content()
    }

    // ---- mutation (callers populate first) ----

    fn properties_mut(&mut self) -> Result<&mut BTreeMap<String, PropertyValue>> {
        let identity = &self.identity;
        self.properties.as_mut().ok_or_else(|| {
            GraphError::precondition(format!("properties of {} are not populated", identity))
        })
    }

    fn aspects_mut(&mut self) -> Result<&mut BTreeSet<String>> {
        let identity = &self.identity;
        self.aspects.as_mut().ok_or_else(|| {
            GraphError::precondition(format!("aspects of {} are not populated", identity))
        })
    }

    /// Store a value, binding content handles to this node and property
    pub(crate) fn insert_property(&mut self, name: String, mut value: PropertyValue) -> Result<()> {
        if let PropertyValue::Content(handle) = &mut value {
            handle.set_owner(self.handle, &name);
        }
        self.content_refs.remove(&name);
        self.properties_mut()?.insert(name, value);
        Ok(())
    }

    /// Swap in a whole new property map
    pub(crate) fn replace_properties(
        &mut self,
        mut properties: BTreeMap<String, PropertyValue>,
    ) -> Result<()> {
        let handle = self.handle;
        for (name, value) in properties.iter_mut() {
            if let PropertyValue::Content(content) = value {
                content.set_owner(handle, name.clone());
            }
        }
        self.content_refs.retain(|name, _| {
            matches!(properties.get(name), Some(PropertyValue::Content(_)))
        });
        *self.properties_mut()? = properties;
        Ok(())
    }

    pub(crate) fn content_mut(&mut self, property: &str) -> Option<&mut ContentHandle> {
        self.properties
            .as_mut()?
            .get_mut(property)
            .and_then(PropertyValue::as_content_mut)
    }

    /// Returns false when the aspect was already present
    pub(crate) fn add_aspect(&mut self, aspect: &str) -> Result<bool> {
        if !self.aspects_mut()?.insert(aspect.to_string()) {
            return Ok(false);
        }
        // Re-adding a persisted aspect only cancels its pending removal
        if !self.removed_aspects.remove(aspect) {
            self.added_aspects.insert(aspect.to_string());
        }
        Ok(true)
    }

    /// Returns false when the aspect was not present
    pub(crate) fn remove_aspect(&mut self, aspect: &str) -> Result<bool> {
        let was_present = self.aspects_mut()?.remove(aspect);
        if self.added_aspects.remove(aspect) {
            return Ok(was_present);
        }
        if was_present {
            self.removed_aspects.insert(aspect.to_string());
        }
        Ok(was_present)
    }

    /// Record the primary edge of a freshly created child
    pub(crate) fn attach_primary_parent(&mut self, edge: ChildAssociation) -> Result<()> {
        if let Some(existing) = self.primary_parent {
            return Err(GraphError::precondition(format!(
                "{} already has primary parent {}",
                self.identity, existing
            )));
        }
        self.primary_parent = Some(edge.parent());
        self.added_parents.push(edge);
        Ok(())
    }

    /// Whether an identical edge is persisted or pending on the parent side
    pub fn has_child_edge(&self, edge: &ChildAssociation) -> bool {
        self.children().iter().any(|e| e.same_edge(edge))
    }

    pub(crate) fn push_added_child(&mut self, edge: ChildAssociation) {
        self.added_children.push(edge);
    }

    pub(crate) fn push_added_parent(&mut self, edge: ChildAssociation) {
        if !self.added_parents.iter().any(|e| e.same_edge(&edge)) {
            self.added_parents.push(edge);
        }
    }

    /// Remove an edge from this (parent) node's effective children
    pub(crate) fn remove_child_edge(
        &mut self,
        edge: &ChildAssociation,
    ) -> EdgeRemoval<ChildAssociation> {
        if let Some(index) = self.added_children.iter().position(|e| e.same_edge(edge)) {
            return EdgeRemoval::Purged(self.added_children.remove(index));
        }

        let persisted = self
            .children
            .iter()
            .flat_map(|children| children.values())
            .find(|e| e.same_edge(edge))
            .cloned();
        match persisted {
            Some(existing) if !self.removed_children.iter().any(|r| r.same_edge(&existing)) => {
                self.removed_children.push(existing.clone());
                EdgeRemoval::Persisted(existing)
            }
            _ => EdgeRemoval::Missing,
        }
    }

    /// Whether `edge` is the pending primary edge of a child created under
    /// this node
    pub(crate) fn is_pending_primary_child(&self, edge: &ChildAssociation) -> bool {
        self.added_children
            .iter()
            .any(|e| e.is_primary() && e.same_edge(edge))
    }

    /// Drop a pending parent edge mirrored from a purged child addition
    pub(crate) fn purge_added_parent(&mut self, edge: &ChildAssociation) {
        self.added_parents.retain(|e| !e.same_edge(edge));
    }

    pub(crate) fn has_association(&self, association: &Association) -> bool {
        self.associations().iter().any(|a| a == association)
    }

    pub(crate) fn push_added_association(&mut self, association: Association) {
        self.added_associations.push(association);
    }

    pub(crate) fn remove_association(
        &mut self,
        association: &Association,
    ) -> EdgeRemoval<Association> {
        if let Some(index) = self
            .added_associations
            .iter()
            .position(|a| a == association)
        {
            return EdgeRemoval::Purged(self.added_associations.remove(index));
        }
        match self
            .associations
            .as_ref()
            .and_then(|associations| associations.get(&association.key()))
        {
            Some(existing) => EdgeRemoval::Persisted(existing.clone()),
            None => EdgeRemoval::Missing,
        }
    }

    // ---- save protocol ----

    /// Append this node's statements to `statements`
    ///
    /// Order: create or update, content, addAspect, removeAspect, addChild
    /// (non-primary edges only), removeChild, createAssociation.
    pub async fn on_before_save(
        &self,
        registry: &NodeRegistry,
        statements: &mut Statements,
        uploader: &Uploader<'_>,
    ) -> Result<()> {
        let target = self.predicate();
        let delta: Vec<PropertyRecord> = self
            .modified_properties()
            .into_iter()
            .map(|(name, value)| PropertyRecord::new(name, value))
            .collect();

        if self.is_new {
            let edge = self
                .added_parents
                .iter()
                .find(|edge| edge.is_primary())
                .ok_or_else(|| {
                    GraphError::validation(format!(
                        "new node {} has no primary parent",
                        self.identity
                    ))
                })?;
            let node_type = self.node_type.clone().ok_or_else(|| {
                GraphError::validation(format!("new node {} has no type", self.identity))
            })?;
            statements.create.push(CreateStatement {
                id: self.identity.id.clone(),
                parent: ParentLink {
                    parent: registry.predicate(edge.parent())?,
                    association_type: edge.association_type().to_string(),
                    child_name: edge.name().to_string(),
                },
                node_type,
                properties: delta,
            });
        } else if !delta.is_empty() {
            statements.update.push(UpdateStatement {
                target: target.clone(),
                properties: delta,
            });
        }

        if let Some(properties) = &self.properties {
            for value in properties.values() {
                if let PropertyValue::Content(handle) = value {
                    handle.on_before_save(&target, statements, uploader).await?;
                }
            }
        }

        for aspect in &self.added_aspects {
            statements.add_aspect.push(AspectStatement {
                target: target.clone(),
                aspect: aspect.clone(),
            });
        }
        for aspect in &self.removed_aspects {
            statements.remove_aspect.push(AspectStatement {
                target: target.clone(),
                aspect: aspect.clone(),
            });
        }

        for edge in self.added_children.iter().filter(|edge| !edge.is_primary()) {
            statements.add_child.push(AddChildStatement {
                parent: target.clone(),
                child: registry.predicate(edge.child())?,
                association_type: edge.association_type().to_string(),
                child_name: edge.name().to_string(),
            });
        }
        for edge in &self.removed_children {
            statements.remove_child.push(RemoveChildStatement {
                parent: target.clone(),
                child: registry.predicate(edge.child())?,
            });
        }

        for association in &self.added_associations {
            statements.create_association.push(CreateAssociationStatement {
                from: target.clone(),
                to: registry.predicate(association.target())?,
                association_type: association.association_type().to_string(),
            });
        }

        Ok(())
    }

    /// Fold pending edits into persisted state after an accepted batch
    ///
    /// Non-primary parent edges stay pending here; they are confirmed from
    /// the parent's side, which is the side that sent them.
    pub(crate) fn on_after_save(&mut self) {
        if self.is_new {
            self.is_new = false;
            self.properties = None;
            self.aspects = None;
            self.path = None;
            self.original_properties.clear();
            self.content_refs.clear();
        } else if let Some(properties) = self.properties.as_mut() {
            for value in properties.values_mut() {
                if let PropertyValue::Content(handle) = value {
                    if handle.is_dirty() {
                        handle.on_after_save();
                    }
                }
            }
            self.original_properties = properties.clone();
        }

        if let Some(children) = self.children.as_mut() {
            for edge in self.added_children.drain(..) {
                children.insert(edge.child(), edge);
            }
            for edge in &self.removed_children {
                if matches!(children.get(&edge.child()), Some(e) if e.same_edge(edge)) {
                    children.remove(&edge.child());
                }
            }
        }

        let (primary, pending): (Vec<_>, Vec<_>) =
            self.added_parents.drain(..).partition(|edge| edge.is_primary());
        self.added_parents = pending;
        if let Some(parents) = self.parents.as_mut() {
            for edge in primary {
                parents.insert(edge.parent(), edge);
            }
        }

        if let Some(associations) = self.associations.as_mut() {
            for association in self.added_associations.drain(..) {
                associations.insert(association.key(), association);
            }
        }

        self.added_aspects.clear();
        self.removed_aspects.clear();
        self.added_children.clear();
        self.removed_children.clear();
        self.added_associations.clear();
    }

    /// The parent saved a child edge pointing at this node
    pub(crate) fn confirm_parent(&mut self, edge: &ChildAssociation) {
        self.added_parents.retain(|e| !e.same_edge(edge));
        if let Some(parents) = self.parents.as_mut() {
            parents.insert(edge.parent(), edge.clone());
        }
    }

    /// A created child saved its primary edge to this node
    pub(crate) fn confirm_child(&mut self, edge: &ChildAssociation) {
        self.added_children.retain(|e| !e.same_edge(edge));
        if let Some(children) = self.children.as_mut() {
            children.insert(edge.child(), edge.clone());
        }
    }

    /// The parent saved the removal of a child edge pointing at this node
    pub(crate) fn drop_parent(&mut self, edge: &ChildAssociation) {
        if let Some(parents) = self.parents.as_mut() {
            if matches!(parents.get(&edge.parent()), Some(e) if e.same_edge(edge)) {
                parents.remove(&edge.parent());
            }
        }
        if edge.is_primary() && self.primary_parent == Some(edge.parent()) {
            self.primary_parent = None;
        }
    }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
