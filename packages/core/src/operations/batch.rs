//! Change Batch Builder - Unit of Work
//!
//! Turns the pending edits of a set of nodes into one [`ChangeBatch`], submits
//! it with a single remote call, and reconciles the participants afterwards.
//!
//! # Atomicity
//!
//! Building never mutates a node. Reconciliation (`commit`) runs only after
//! the service accepted the whole batch, so a failed build or submission
//! leaves every node exactly as dirty as before and the save can be retried.
//!
//! # Examples
//!
//! ```rust,no_run
//! use repograph_core::config::RepositoryConfig;
//! use repograph_core::operations::{BatchBuilder, Uploader};
//! use repograph_core::remote::InMemoryRepository;
//! use repograph_core::session::NodeRegistry;
//!
//! # async fn example(registry: &mut NodeRegistry) -> repograph_core::operations::Result<()> {
//! let repository = InMemoryRepository::new();
//! let config = RepositoryConfig::default();
//! let dirty: Vec<_> = registry.nodes().filter(|n| n.is_dirty()).map(|n| n.handle()).collect();
//!
//! let batch = BatchBuilder::new(registry, Uploader::new(&repository, &config))
//!     .build(&dirty)
//!     .await?;
//! let outcome = batch.submit(&repository).await?;
//! batch.commit(registry, &outcome)?;
//! # Ok(())
//! # }
//! ```

use crate::config::RepositoryConfig;
use crate::models::{ChildAssociation, Identity, NodeRef};
use crate::operations::{GraphError, Result, Statements};
use crate::remote::{BatchOutcome, ContentTransport, RepositoryService, UploadRequest};
use crate::session::NodeRegistry;
use std::path::Path;

/// Streams file payloads to the repository while a batch is built
pub struct Uploader<'a> {
    transport: &'a dyn ContentTransport,
    config: &'a RepositoryConfig,
}

impl<'a> Uploader<'a> {
    pub fn new(transport: &'a dyn ContentTransport, config: &'a RepositoryConfig) -> Self {
        Self { transport, config }
    }

    /// Upload a local file and return the content reference token
    pub async fn upload_file(
        &self,
        path: &Path,
        mimetype: &str,
        encoding: Option<&str>,
    ) -> Result<String> {
        let file = tokio::fs::File::open(path).await?;
        let length = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content".to_string());

        let request = UploadRequest {
            file_name,
            length,
            mimetype: Some(mimetype.to_string()),
            encoding: encoding.map(str::to_string),
        };
        let token = self
            .transport
            .upload(self.config, &request, Box::new(file))
            .await?;
        Ok(token)
    }
}

/// Collects statements from participating nodes
pub struct BatchBuilder<'a> {
    registry: &'a NodeRegistry,
    uploader: Uploader<'a>,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(registry: &'a NodeRegistry, uploader: Uploader<'a>) -> Self {
        Self { registry, uploader }
    }

    /// Build one batch from `participants`
    ///
    /// Participants are visited in creation order so a created parent's
    /// `create` precedes its created children's.
    pub async fn build(&self, participants: &[NodeRef]) -> Result<ChangeBatch> {
        let mut participants = participants.to_vec();
        participants.sort();
        participants.dedup();

        let mut statements = Statements::new();
        for node in &participants {
            self.registry
                .node(*node)?
                .on_before_save(self.registry, &mut statements, &self.uploader)
                .await?;
        }

        Ok(ChangeBatch {
            participants,
            statements,
        })
    }
}

/// Statements of one save plus the nodes that contributed them
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    participants: Vec<NodeRef>,
    statements: Statements,
}

impl ChangeBatch {
    pub fn participants(&self) -> &[NodeRef] {
        &self.participants
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Submit with exactly one remote call; empty batches are refused
    pub async fn submit(&self, service: &dyn RepositoryService) -> Result<BatchOutcome> {
        if self.is_empty() {
            return Err(GraphError::precondition("refusing to submit an empty batch"));
        }
        tracing::info!(
            "Submitting batch for {} node(s): {}",
            self.participants.len(),
            self.statements.summary()
        );
        match service.submit_batch(&self.statements).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!("Batch submission failed, local state left unchanged: {}", e);
                Err(e.into())
            }
        }
    }

    /// Reconcile every participant against an accepted batch
    ///
    /// Returns the `(temporary, final)` identity pairs that were reassigned.
    pub fn commit(
        self,
        registry: &mut NodeRegistry,
        outcome: &BatchOutcome,
    ) -> Result<Vec<(Identity, Identity)>> {
        // Edges the counterpart nodes must learn about, captured before the
        // participants clear their pending sets
        let mut sent_children: Vec<ChildAssociation> = Vec::new();
        let mut sent_primary_parents: Vec<ChildAssociation> = Vec::new();
        let mut sent_removals: Vec<ChildAssociation> = Vec::new();
        for node in &self.participants {
            let state = registry.node(*node)?;
            sent_children.extend(state.added_children().iter().cloned());
            sent_primary_parents.extend(
                state
                    .added_parents()
                    .iter()
                    .filter(|edge| edge.is_primary())
                    .cloned(),
            );
            sent_removals.extend(state.removed_children().iter().cloned());
        }

        let mut reassigned = Vec::new();
        for node in &self.participants {
            let state = registry.node(*node)?;
            if state.is_new() {
                let temporary = state.identity().clone();
                match outcome.id_map.get(&temporary.id) {
                    Some(id) => {
                        let assigned = temporary.with_id(id.clone());
                        tracing::debug!("Reassigned {} -> {}", temporary, assigned);
                        registry.rekey(*node, assigned.clone())?;
                        reassigned.push((temporary, assigned));
                    }
                    None => {
                        tracing::debug!(
                            "No server id reported for {}, keeping identifier",
                            temporary
                        );
                    }
                }
            }
            registry.node_mut(*node)?.on_after_save();
        }

        for edge in &sent_children {
            registry.node_mut(edge.child())?.confirm_parent(edge);
        }
        for edge in &sent_primary_parents {
            registry.node_mut(edge.parent())?.confirm_child(edge);
        }
        for edge in &sent_removals {
            registry.node_mut(edge.child())?.drop_parent(edge);
        }

        Ok(reassigned)
    }
}
