//! Versions

use crate::models::{NodeRef, Version};
use crate::operations::{GraphError, Result};
use crate::session::Session;

impl Session {
    /// Snapshot a saved node into its version history
    ///
    /// The node must have no pending edits. Its property and aspect caches are
    /// dropped afterwards because the repository stamps version metadata on it.
    pub async fn create_version(
        &mut self,
        node: NodeRef,
        description: Option<&str>,
        major: bool,
    ) -> Result<Version> {
        let state = self.registry.node(node)?;
        if state.is_dirty() {
            return Err(GraphError::precondition(format!(
                "{} has unsaved changes; save before creating a version",
                state.identity()
            )));
        }
        let identity = state.identity().clone();

        let info = self
            .service
            .create_version(&identity, description, major)
            .await?;
        tracing::debug!(
            "Created version {} of {}",
            info.label.as_deref().unwrap_or("?"),
            identity
        );

        self.registry.node_mut(node)?.invalidate_properties();
        let version_node = self.registry.get(&info.identity);
        Ok(Version {
            node: version_node,
            identity: info.identity,
            label: info.label,
            versioned: node,
        })
    }
}
