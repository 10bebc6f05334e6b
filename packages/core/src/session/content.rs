//! Content API
//!
//! Binary content hangs off ordinary properties as [`ContentHandle`]s. Their
//! metadata (size, mimetype, encoding, URL) is read once on first access;
//! payloads are only fetched when asked for, through the content transport.

use crate::models::{ContentHandle, NodeRef, PropertyValue};
use crate::operations::{GraphError, Result};
use crate::session::Session;
use std::path::Path;

impl Session {
    fn missing_content(&self, node: NodeRef, property: &str) -> GraphError {
        match self.registry.node(node) {
            Ok(state) => GraphError::not_found(format!(
                "{} has no content property '{}'",
                state.identity(),
                property
            )),
            Err(e) => e,
        }
    }

    fn content_mut(&mut self, node: NodeRef, property: &str) -> Result<&mut ContentHandle> {
        let found = self
            .registry
            .node(node)?
            .properties()
            .and_then(|properties| properties.get(property))
            .map(PropertyValue::is_content)
            .unwrap_or(false);
        if !found {
            return Err(self.missing_content(node, property));
        }
        self.registry
            .node_mut(node)?
            .content_mut(property)
            .ok_or_else(|| GraphError::not_found(format!("content property '{}'", property)))
    }

    /// Read content metadata for `property` unless already known
    async fn populate_content(&mut self, node: NodeRef, property: &str) -> Result<()> {
        self.populate_properties(node).await?;
        let state = self.registry.node(node)?;
        let handle = state
            .properties()
            .and_then(|properties| properties.get(property))
            .and_then(PropertyValue::as_content)
            .ok_or_else(|| self.missing_content(node, property))?;
        if !handle.needs_population(state.is_new()) {
            return Ok(());
        }
        let identity = state.identity().clone();

        tracing::debug!("Reading content metadata of {} '{}'", identity, property);
        let record = self.service.read_content(&identity, property).await?;
        self.content_mut(node, property)?.apply_record(record);
        Ok(())
    }

    /// Content handle of a property, with metadata populated
    pub async fn content(&mut self, node: NodeRef, property: &str) -> Result<&ContentHandle> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        self.content_mut(node, &property).map(|handle| &*handle)
    }

    /// Fetch URL carrying the session ticket
    pub async fn content_url(&mut self, node: NodeRef, property: &str) -> Result<Option<String>> {
        let ticket = self.config.ticket.clone();
        Ok(self.content(node, property).await?.ticket_url(&ticket))
    }

    /// Fetch URL for anonymous access
    pub async fn guest_url(&mut self, node: NodeRef, property: &str) -> Result<Option<String>> {
        Ok(self.content(node, property).await?.guest_url())
    }

    pub async fn set_content_mimetype(
        &mut self,
        node: NodeRef,
        property: &str,
        mimetype: &str,
    ) -> Result<()> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        self.content_mut(node, &property)?.set_mimetype(mimetype);
        Ok(())
    }

    pub async fn set_content_encoding(
        &mut self,
        node: NodeRef,
        property: &str,
        encoding: Option<&str>,
    ) -> Result<()> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        self.content_mut(node, &property)?
            .set_encoding(encoding.map(str::to_string));
        Ok(())
    }

    /// Replace the payload with in-memory bytes; the last write wins
    pub async fn set_content(
        &mut self,
        node: NodeRef,
        property: &str,
        content: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        self.content_mut(node, &property)?.set_content(content);
        Ok(())
    }

    /// Replace the payload with a local file, uploaded when the node is saved
    pub async fn write_content_from_file(
        &mut self,
        node: NodeRef,
        property: &str,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        self.content_mut(node, &property)?.write_from_file(path);
        Ok(())
    }

    /// The payload: unsaved bytes if pending, otherwise downloaded
    pub async fn read_content(&mut self, node: NodeRef, property: &str) -> Result<Option<Vec<u8>>> {
        let property = self.qualify(property);
        self.populate_content(node, &property).await?;
        let handle = self.content_mut(node, &property)?.clone();
        if let Some(bytes) = handle.pending_bytes().await? {
            return Ok(Some(bytes));
        }

        let Some(url) = handle.ticket_url(&self.config.ticket) else {
            return Ok(None);
        };
        tracing::debug!("Downloading content from {}", url);
        let bytes = self.transport.download(&self.config, &url).await?;
        Ok(Some(bytes))
    }

    /// Write the payload to a local file; returns false when there is none
    pub async fn read_content_to_file(
        &mut self,
        node: NodeRef,
        property: &str,
        path: impl AsRef<Path>,
    ) -> Result<bool> {
        match self.read_content(node, property).await? {
            Some(bytes) => {
                tokio::fs::write(path, bytes).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
