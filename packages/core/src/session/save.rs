//! Save
//!
//! Collects the pending edits of the participating nodes into one batch,
//! submits it with a single remote call and reconciles the nodes afterwards.
//! Nothing is reconciled unless the whole batch was accepted.

use crate::models::{Identity, NodeRef, NodeState};
use crate::operations::{BatchBuilder, GraphError, Result, Uploader};
use crate::remote::{BatchOutcome, VersionInfo};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a save sent and what came back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Statements in the submitted batch; zero when nothing was pending
    pub statement_count: usize,
    /// `(temporary, final)` identities of nodes created by this save
    pub reassigned: Vec<(Identity, Identity)>,
    /// Version created by the repository as a side effect, if any
    pub version: Option<VersionInfo>,
}

impl Session {
    /// Save every node with pending edits
    pub async fn save(&mut self) -> Result<SaveReport> {
        let dirty: Vec<NodeRef> = self
            .registry
            .nodes()
            .filter(|state| state.is_dirty())
            .map(NodeState::handle)
            .collect();
        self.save_batch(&dirty).await
    }

    /// Save only `nodes`
    ///
    /// Fails before any remote call if one of them has a pending edge to a
    /// new node that is not saved with it.
    pub async fn save_nodes(&mut self, nodes: &[NodeRef]) -> Result<SaveReport> {
        let included: BTreeSet<NodeRef> = nodes.iter().copied().collect();
        for node in &included {
            self.check_pending_references(*node, &included)?;
        }

        let mut dirty = Vec::with_capacity(included.len());
        for node in &included {
            if self.registry.node(*node)?.is_dirty() {
                dirty.push(*node);
            }
        }
        self.save_batch(&dirty).await
    }

    fn check_pending_references(&self, node: NodeRef, included: &BTreeSet<NodeRef>) -> Result<()> {
        let state = self.registry.node(node)?;
        let referenced = state
            .added_children()
            .iter()
            .map(|edge| edge.child())
            .chain(
                state
                    .added_parents()
                    .iter()
                    .filter(|edge| edge.is_primary())
                    .map(|edge| edge.parent()),
            )
            .chain(state.added_associations().iter().map(|assoc| assoc.target()));

        for peer in referenced {
            if included.contains(&peer) {
                continue;
            }
            let peer_state = self.registry.node(peer)?;
            if peer_state.is_new() {
                return Err(GraphError::precondition(format!(
                    "{} references unsaved node {} which is not part of this save",
                    state.identity(),
                    peer_state.identity()
                )));
            }
        }
        Ok(())
    }

    async fn save_batch(&mut self, participants: &[NodeRef]) -> Result<SaveReport> {
        let batch = {
            let uploader = Uploader::new(self.transport.as_ref(), &self.config);
            BatchBuilder::new(&self.registry, uploader)
                .build(participants)
                .await?
        };

        if batch.is_empty() {
            tracing::debug!("Nothing to save for {} node(s)", batch.participants().len());
            let reassigned = batch.commit(&mut self.registry, &BatchOutcome::default())?;
            return Ok(SaveReport {
                reassigned,
                ..SaveReport::default()
            });
        }

        let statement_count = batch.statements().len();
        let outcome = batch.submit(self.service.as_ref()).await?;
        let reassigned = batch.commit(&mut self.registry, &outcome)?;
        tracing::info!(
            "Saved {} statement(s), {} node(s) created",
            statement_count,
            reassigned.len()
        );

        Ok(SaveReport {
            statement_count,
            reassigned,
            version: outcome.version,
        })
    }
}
