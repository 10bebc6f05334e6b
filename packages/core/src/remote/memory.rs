//! In-Memory Repository
//!
//! A complete, process-local implementation of [`RepositoryService`] and
//! [`ContentTransport`]. It backs the test suite and is handy for running the
//! graph without a server.
//!
//! # Behaviour
//!
//! - A store root (`sys:store_root`, path `/`) exists in
//!   `workspace://SpacesStore` from construction; [`InMemoryRepository::root`]
//!   returns its identity.
//! - Batches are applied to a copy of the state, which replaces the live state
//!   only if every statement succeeded.
//! - Created nodes receive UUIDs, `cm:created`/`cm:modified` timestamps and the
//!   `cm:auditable` aspect.
//! - Every trait call is counted per operation name (`read_node`,
//!   `query_children`, `submit_batch`, `upload`, ...) and failures can be
//!   injected for batches and reads.

use crate::config::RepositoryConfig;
use crate::models::{ContentReference, Identity, StoreRef};
use crate::operations::{Predicate, Statements};
use crate::remote::{
    columns, AssociationDirection, AssociationFilter, BatchOutcome, ContentRecord,
    ContentTransport, NodeRecord, PropertyRecord, RemoteError, RepositoryService, ResultRow,
    ResultSet, UploadBody, UploadRequest, VersionInfo,
};
use async_trait::async_trait;
use chrono::{Datelike, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Qualified names the repository maintains itself
pub mod names {
    pub const NAME: &str = "{http://www.alfresco.org/model/content/1.0}name";
    pub const CREATED: &str = "{http://www.alfresco.org/model/content/1.0}created";
    pub const MODIFIED: &str = "{http://www.alfresco.org/model/content/1.0}modified";
    pub const CONTAINS: &str = "{http://www.alfresco.org/model/content/1.0}contains";
    pub const FOLDER: &str = "{http://www.alfresco.org/model/content/1.0}folder";
    pub const AUDITABLE: &str = "{http://www.alfresco.org/model/content/1.0}auditable";
    pub const VERSIONABLE: &str = "{http://www.alfresco.org/model/content/1.0}versionable";
    pub const VERSION_LABEL: &str = "{http://www.alfresco.org/model/content/1.0}versionLabel";
    pub const REFERENCEABLE: &str = "{http://www.alfresco.org/model/system/1.0}referenceable";
    pub const STORE_ROOT: &str = "{http://www.alfresco.org/model/system/1.0}store_root";
    pub const VERSIONED_NODE: &str =
        "{http://www.alfresco.org/model/versionstore/1.0}versionedNode";
    pub const VERSION_DESCRIPTION: &str =
        "{http://www.alfresco.org/model/versionstore/1.0}versionDescription";
}

const DEFAULT_BASE_URL: &str = "http://localhost:8080/alfresco";

#[derive(Debug, Clone)]
struct StoredContent {
    bytes: Vec<u8>,
    mimetype: Option<String>,
    encoding: Option<String>,
    store_url: String,
    download_url: String,
}

impl StoredContent {
    fn reference(&self) -> String {
        ContentReference {
            url: self.store_url.clone(),
            mimetype: self.mimetype.clone(),
            size: Some(self.bytes.len() as u64),
            encoding: self.encoding.clone(),
            locale: None,
        }
        .to_string()
    }
}

#[derive(Debug, Clone)]
struct StoredNode {
    node_type: String,
    path: Option<String>,
    aspects: BTreeSet<String>,
    properties: BTreeMap<String, Value>,
    content: BTreeMap<String, StoredContent>,
}

#[derive(Debug, Clone)]
struct ChildEdge {
    parent: Identity,
    child: Identity,
    association_type: String,
    name: String,
    is_primary: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct AssociationEdge {
    from: Identity,
    to: Identity,
    association_type: String,
}

#[derive(Debug, Clone, Default)]
struct RepositoryState {
    nodes: HashMap<Identity, StoredNode>,
    child_edges: Vec<ChildEdge>,
    associations: Vec<AssociationEdge>,
    uploads: HashMap<String, StoredContent>,
    version_labels: HashMap<Identity, Vec<String>>,
}

fn new_store_url() -> String {
    let now = Utc::now();
    format!(
        "store://{}/{}/{}/{}.bin",
        now.year(),
        now.month(),
        now.day(),
        Uuid::new_v4()
    )
}

fn rejected(message: impl Into<String>) -> RemoteError {
    RemoteError::rejected("submit_batch", message)
}

impl RepositoryState {
    fn node(&self, identity: &Identity) -> Result<&StoredNode, RemoteError> {
        self.nodes
            .get(identity)
            .ok_or_else(|| RemoteError::not_found(identity.to_string()))
    }

    fn node_mut(&mut self, identity: &Identity) -> Result<&mut StoredNode, RemoteError> {
        self.nodes
            .get_mut(identity)
            .ok_or_else(|| RemoteError::not_found(identity.to_string()))
    }

    fn record(&self, identity: &Identity) -> Result<NodeRecord, RemoteError> {
        let node = self.node(identity)?;
        let mut properties = vec![
            PropertyRecord::new(columns::NODE_UUID, Value::String(identity.id.clone())),
            PropertyRecord::new(
                columns::STORE_PROTOCOL,
                Value::String(identity.store.scheme.clone()),
            ),
            PropertyRecord::new(
                columns::STORE_IDENTIFIER,
                Value::String(identity.store.address.clone()),
            ),
        ];
        properties.extend(
            node.properties
                .iter()
                .map(|(name, value)| PropertyRecord::new(name.clone(), value.clone())),
        );
        properties.extend(
            node.content
                .iter()
                .map(|(name, content)| PropertyRecord::new(name.clone(), content.reference().into())),
        );

        Ok(NodeRecord {
            identity: identity.clone(),
            path: node.path.clone(),
            node_type: node.node_type.clone(),
            aspects: node.aspects.iter().cloned().collect(),
            properties,
        })
    }

    fn stored_content(
        base_url: &str,
        owner: &Identity,
        bytes: Vec<u8>,
        mimetype: Option<String>,
        encoding: Option<String>,
        store_url: Option<String>,
    ) -> StoredContent {
        StoredContent {
            bytes,
            mimetype,
            encoding,
            store_url: store_url.unwrap_or_else(new_store_url),
            download_url: format!(
                "{}/download/direct/{}/{}/{}/{}.bin",
                base_url,
                owner.store.scheme,
                owner.store.address,
                owner.id,
                Uuid::new_v4().simple()
            ),
        }
    }

    fn insert_child(
        &mut self,
        parent: &Identity,
        association_type: &str,
        child_name: &str,
        node_type: &str,
        mut properties: BTreeMap<String, Value>,
    ) -> Result<Identity, RemoteError> {
        let parent_path = self.node(parent)?.path.clone().unwrap_or_default();
        let identity = Identity::new(parent.store.clone(), Uuid::new_v4().to_string());

        let now = Value::String(Utc::now().to_rfc3339());
        properties.insert(names::CREATED.to_string(), now.clone());
        properties.insert(names::MODIFIED.to_string(), now);

        let aspects = [names::AUDITABLE, names::REFERENCEABLE]
            .iter()
            .map(|a| a.to_string())
            .collect();

        self.nodes.insert(
            identity.clone(),
            StoredNode {
                node_type: node_type.to_string(),
                path: Some(format!("{}/{}", parent_path.trim_end_matches('/'), child_name)),
                aspects,
                properties,
                content: BTreeMap::new(),
            },
        );
        self.child_edges.push(ChildEdge {
            parent: parent.clone(),
            child: identity.clone(),
            association_type: association_type.to_string(),
            name: child_name.to_string(),
            is_primary: true,
        });
        Ok(identity)
    }

    fn resolve(
        &self,
        predicate: &Predicate,
        created: &HashMap<String, Identity>,
    ) -> Result<Identity, RemoteError> {
        match predicate {
            Predicate::Node(identity) => {
                self.node(identity)?;
                Ok(identity.clone())
            }
            Predicate::PendingId(id) => created
                .get(id)
                .cloned()
                .ok_or_else(|| rejected(format!("unresolved reference {}", predicate))),
        }
    }

    fn set_property(
        &mut self,
        base_url: &str,
        target: &Identity,
        property: &PropertyRecord,
    ) -> Result<(), RemoteError> {
        let uploaded = property
            .value
            .as_str()
            .and_then(ContentReference::parse)
            .and_then(|reference| self.uploads.remove(&reference.url));

        let node = self.node_mut(target)?;
        match uploaded {
            Some(upload) => {
                node.properties.remove(&property.name);
                node.content.insert(
                    property.name.clone(),
                    Self::stored_content(
                        base_url,
                        target,
                        upload.bytes,
                        upload.mimetype,
                        upload.encoding,
                        Some(upload.store_url),
                    ),
                );
            }
            None => {
                node.content.remove(&property.name);
                node.properties
                    .insert(property.name.clone(), property.value.clone());
            }
        }
        Ok(())
    }

    fn touch(&mut self, target: &Identity) -> Result<(), RemoteError> {
        let node = self.node_mut(target)?;
        if node.aspects.contains(names::AUDITABLE) {
            node.properties.insert(
                names::MODIFIED.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        Ok(())
    }

    /// Apply every statement kind in service order; returns temp id → uuid
    fn apply(
        &mut self,
        base_url: &str,
        statements: &Statements,
    ) -> Result<HashMap<String, String>, RemoteError> {
        let mut created: HashMap<String, Identity> = HashMap::new();

        for create in &statements.create {
            let parent = self.resolve(&create.parent.parent, &created)?;
            let properties = create
                .properties
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect();
            let identity = self.insert_child(
                &parent,
                &create.parent.association_type,
                &create.parent.child_name,
                &create.node_type,
                properties,
            )?;
            created.insert(create.id.clone(), identity);
        }

        for update in &statements.update {
            let target = self.resolve(&update.target, &created)?;
            for property in &update.properties {
                self.set_property(base_url, &target, property)?;
            }
            self.touch(&target)?;
        }

        for write in &statements.write_content {
            let target = self.resolve(&write.target, &created)?;
            let content = Self::stored_content(
                base_url,
                &target,
                write.content.clone(),
                Some(write.format.mimetype.clone()),
                write.format.encoding.clone(),
                None,
            );
            let node = self.node_mut(&target)?;
            node.properties.remove(&write.property);
            node.content.insert(write.property.clone(), content);
            self.touch(&target)?;
        }

        for statement in &statements.add_aspect {
            let target = self.resolve(&statement.target, &created)?;
            self.node_mut(&target)?
                .aspects
                .insert(statement.aspect.clone());
        }

        for statement in &statements.remove_aspect {
            let target = self.resolve(&statement.target, &created)?;
            self.node_mut(&target)?.aspects.remove(&statement.aspect);
        }

        for statement in &statements.add_child {
            let parent = self.resolve(&statement.parent, &created)?;
            let child = self.resolve(&statement.child, &created)?;
            let exists = self.child_edges.iter().any(|e| {
                e.parent == parent
                    && e.child == child
                    && e.association_type == statement.association_type
                    && e.name == statement.child_name
            });
            if !exists {
                self.child_edges.push(ChildEdge {
                    parent,
                    child,
                    association_type: statement.association_type.clone(),
                    name: statement.child_name.clone(),
                    is_primary: false,
                });
            }
        }

        for statement in &statements.remove_child {
            let parent = self.resolve(&statement.parent, &created)?;
            let child = self.resolve(&statement.child, &created)?;
            let before = self.child_edges.len();
            self.child_edges
                .retain(|e| !(e.parent == parent && e.child == child));
            if self.child_edges.len() == before {
                return Err(rejected(format!(
                    "{} is not a child of {}",
                    child, parent
                )));
            }
        }

        for statement in &statements.create_association {
            let from = self.resolve(&statement.from, &created)?;
            let to = self.resolve(&statement.to, &created)?;
            let edge = AssociationEdge {
                from,
                to,
                association_type: statement.association_type.clone(),
            };
            if !self.associations.contains(&edge) {
                self.associations.push(edge);
            }
        }

        Ok(created
            .into_iter()
            .map(|(temporary, identity)| (temporary, identity.id))
            .collect())
    }

    fn next_version_label(&self, node: &Identity, major: bool) -> String {
        let Some(last) = self.version_labels.get(node).and_then(|labels| labels.last()) else {
            return "1.0".to_string();
        };
        let (major_part, minor_part) = last
            .split_once('.')
            .and_then(|(a, b)| Some((a.parse::<u32>().ok()?, b.parse::<u32>().ok()?)))
            .unwrap_or((1, 0));
        if major {
            format!("{}.0", major_part + 1)
        } else {
            format!("{}.{}", major_part, minor_part + 1)
        }
    }
}

#[derive(Debug, Default)]
struct Failures {
    next_batch: Option<String>,
    reads: bool,
}

/// Process-local repository
#[derive(Debug)]
pub struct InMemoryRepository {
    root: Identity,
    base_url: String,
    state: Mutex<RepositoryState>,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<Failures>,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        let root = Identity::new(StoreRef::spaces_store(), Uuid::new_v4().to_string());
        let mut state = RepositoryState::default();
        state.nodes.insert(
            root.clone(),
            StoredNode {
                node_type: names::STORE_ROOT.to_string(),
                path: Some("/".to_string()),
                aspects: [names::REFERENCEABLE.to_string()].into_iter().collect(),
                properties: BTreeMap::new(),
                content: BTreeMap::new(),
            },
        );

        Self {
            root,
            base_url: DEFAULT_BASE_URL.to_string(),
            state: Mutex::new(state),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(Failures::default()),
        }
    }

    /// Identity of the store root
    pub fn root(&self) -> Identity {
        self.root.clone()
    }

    async fn record_call(&self, operation: &str) {
        *self
            .calls
            .lock()
            .await
            .entry(operation.to_string())
            .or_insert(0) += 1;
    }

    async fn check_reads(&self) -> Result<(), RemoteError> {
        if self.failures.lock().await.reads {
            return Err(RemoteError::transport("injected read failure"));
        }
        Ok(())
    }

    /// Number of calls made to `operation` so far
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .await
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub async fn reset_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Reject the next submitted batch with `message`
    pub async fn fail_next_batch(&self, message: impl Into<String>) {
        self.failures.lock().await.next_batch = Some(message.into());
    }

    /// Make node reads and relation queries fail until switched off
    pub async fn fail_reads(&self, fail: bool) {
        self.failures.lock().await.reads = fail;
    }

    /// Server-side view of a node, bypassing call counting
    pub async fn stored_record(&self, identity: &Identity) -> Option<NodeRecord> {
        self.state.lock().await.record(identity).ok()
    }

    /// Stored bytes of one content property
    pub async fn stored_content(&self, identity: &Identity, property: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .nodes
            .get(identity)
            .and_then(|node| node.content.get(property))
            .map(|content| content.bytes.clone())
    }

    pub async fn node_count(&self) -> usize {
        self.state.lock().await.nodes.len()
    }

    /// Create a node server-side under `parent` via `cm:contains`
    pub async fn seed_child(
        &self,
        parent: &Identity,
        node_type: &str,
        name: &str,
    ) -> Result<Identity, RemoteError> {
        let mut properties = BTreeMap::new();
        properties.insert(names::NAME.to_string(), Value::String(name.to_string()));
        self.state.lock().await.insert_child(
            parent,
            names::CONTAINS,
            &format!("{{http://www.alfresco.org/model/content/1.0}}{}", name),
            node_type,
            properties,
        )
    }

    pub async fn seed_property(
        &self,
        identity: &Identity,
        name: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        self.state
            .lock()
            .await
            .node_mut(identity)?
            .properties
            .insert(name.to_string(), value);
        Ok(())
    }

    pub async fn seed_content(
        &self,
        identity: &Identity,
        property: &str,
        bytes: &[u8],
        mimetype: &str,
        encoding: Option<&str>,
    ) -> Result<(), RemoteError> {
        let content = RepositoryState::stored_content(
            &self.base_url,
            identity,
            bytes.to_vec(),
            Some(mimetype.to_string()),
            encoding.map(str::to_string),
            None,
        );
        self.state
            .lock()
            .await
            .node_mut(identity)?
            .content
            .insert(property.to_string(), content);
        Ok(())
    }

    /// Add a secondary (non-primary) child edge
    pub async fn seed_child_edge(
        &self,
        parent: &Identity,
        child: &Identity,
        association_type: &str,
        name: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.node(parent)?;
        state.node(child)?;
        state.child_edges.push(ChildEdge {
            parent: parent.clone(),
            child: child.clone(),
            association_type: association_type.to_string(),
            name: name.to_string(),
            is_primary: false,
        });
        Ok(())
    }

    pub async fn seed_association(
        &self,
        from: &Identity,
        to: &Identity,
        association_type: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        state.node(from)?;
        state.node(to)?;
        state.associations.push(AssociationEdge {
            from: from.clone(),
            to: to.clone(),
            association_type: association_type.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl RepositoryService for InMemoryRepository {
    async fn read_node(&self, node: &Identity) -> Result<NodeRecord, RemoteError> {
        self.record_call("read_node").await;
        self.check_reads().await?;
        self.state.lock().await.record(node)
    }

    async fn query_children(&self, node: &Identity) -> Result<ResultSet, RemoteError> {
        self.record_call("query_children").await;
        self.check_reads().await?;
        let state = self.state.lock().await;
        state.node(node)?;

        let rows = state
            .child_edges
            .iter()
            .filter(|edge| &edge.parent == node)
            .enumerate()
            .map(|(nth, edge)| {
                ResultRow::new()
                    .with_peer(&edge.child)
                    .with(columns::ASSOCIATION_TYPE, edge.association_type.clone())
                    .with(columns::ASSOCIATION_NAME, edge.name.clone())
                    .with(columns::IS_PRIMARY, edge.is_primary.to_string())
                    .with(columns::NTH_SIBLING, nth.to_string())
            })
            .collect();
        Ok(ResultSet::new(rows))
    }

    async fn query_parents(&self, node: &Identity) -> Result<ResultSet, RemoteError> {
        self.record_call("query_parents").await;
        self.check_reads().await?;
        let state = self.state.lock().await;
        state.node(node)?;

        let rows = state
            .child_edges
            .iter()
            .filter(|edge| &edge.child == node)
            .map(|edge| {
                ResultRow::new()
                    .with_peer(&edge.parent)
                    .with(columns::ASSOCIATION_TYPE, edge.association_type.clone())
                    .with(columns::ASSOCIATION_NAME, edge.name.clone())
                    .with(columns::IS_PRIMARY, edge.is_primary.to_string())
            })
            .collect();
        Ok(ResultSet::new(rows))
    }

    async fn query_associated(
        &self,
        node: &Identity,
        filter: &AssociationFilter,
    ) -> Result<ResultSet, RemoteError> {
        self.record_call("query_associated").await;
        self.check_reads().await?;
        let state = self.state.lock().await;
        state.node(node)?;

        let type_matches = |edge: &AssociationEdge| {
            filter
                .association_type
                .as_ref()
                .map(|t| t == &edge.association_type)
                .unwrap_or(true)
        };
        let want_targets = !matches!(filter.direction, Some(AssociationDirection::Source));
        let want_sources = !matches!(filter.direction, Some(AssociationDirection::Target));

        let mut rows = Vec::new();
        for edge in &state.associations {
            if !type_matches(edge) {
                continue;
            }
            if want_targets && &edge.from == node {
                rows.push(
                    ResultRow::new()
                        .with_peer(&edge.to)
                        .with(columns::ASSOCIATION_TYPE, edge.association_type.clone()),
                );
            }
            if want_sources && &edge.to == node {
                rows.push(
                    ResultRow::new()
                        .with_peer(&edge.from)
                        .with(columns::ASSOCIATION_TYPE, edge.association_type.clone()),
                );
            }
        }
        Ok(ResultSet::new(rows))
    }

    async fn read_content(
        &self,
        node: &Identity,
        property: &str,
    ) -> Result<Option<ContentRecord>, RemoteError> {
        self.record_call("read_content").await;
        self.check_reads().await?;
        let state = self.state.lock().await;
        Ok(state.node(node)?.content.get(property).map(|content| ContentRecord {
            length: Some(content.bytes.len() as u64),
            mimetype: content.mimetype.clone(),
            encoding: content.encoding.clone(),
            url: Some(content.download_url.clone()),
        }))
    }

    async fn submit_batch(&self, statements: &Statements) -> Result<BatchOutcome, RemoteError> {
        self.record_call("submit_batch").await;
        if let Some(message) = self.failures.lock().await.next_batch.take() {
            return Err(rejected(message));
        }

        let mut state = self.state.lock().await;
        let mut working = state.clone();
        let id_map = working.apply(&self.base_url, statements)?;
        *state = working;

        Ok(BatchOutcome {
            id_map,
            version: None,
        })
    }

    async fn create_version(
        &self,
        node: &Identity,
        description: Option<&str>,
        major: bool,
    ) -> Result<VersionInfo, RemoteError> {
        self.record_call("create_version").await;
        let mut state = self.state.lock().await;
        let label = state.next_version_label(node, major);

        let versioned = state.node_mut(node)?;
        versioned.aspects.insert(names::VERSIONABLE.to_string());
        versioned
            .properties
            .insert(names::VERSION_LABEL.to_string(), Value::String(label.clone()));

        let mut snapshot = versioned.clone();
        snapshot.node_type = names::VERSIONED_NODE.to_string();
        snapshot.path = None;
        if let Some(description) = description {
            snapshot.properties.insert(
                names::VERSION_DESCRIPTION.to_string(),
                Value::String(description.to_string()),
            );
        }

        let identity = Identity::new(
            StoreRef::new("versionStore", "version2Store"),
            Uuid::new_v4().to_string(),
        );
        state.nodes.insert(identity.clone(), snapshot);
        state
            .version_labels
            .entry(node.clone())
            .or_default()
            .push(label.clone());

        Ok(VersionInfo {
            identity,
            label: Some(label),
        })
    }
}

#[async_trait]
impl ContentTransport for InMemoryRepository {
    async fn upload(
        &self,
        _config: &RepositoryConfig,
        request: &UploadRequest,
        mut body: UploadBody,
    ) -> Result<String, RemoteError> {
        self.record_call("upload").await;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).await?;
        if bytes.len() as u64 != request.length {
            return Err(RemoteError::transport(format!(
                "upload body was {} bytes, declared {}",
                bytes.len(),
                request.length
            )));
        }

        let store_url = new_store_url();
        let content = StoredContent {
            bytes,
            mimetype: request.mimetype.clone(),
            encoding: request.encoding.clone(),
            store_url: store_url.clone(),
            download_url: String::new(),
        };
        let token = content.reference();
        self.state.lock().await.uploads.insert(store_url, content);
        Ok(token)
    }

    async fn download(&self, _config: &RepositoryConfig, url: &str) -> Result<Vec<u8>, RemoteError> {
        self.record_call("download").await;
        let base = url.split('?').next().unwrap_or(url);
        let state = self.state.lock().await;
        state
            .nodes
            .values()
            .flat_map(|node| node.content.values())
            .find(|content| content.download_url == base)
            .map(|content| content.bytes.clone())
            .ok_or_else(|| RemoteError::not_found(url))
    }
}
