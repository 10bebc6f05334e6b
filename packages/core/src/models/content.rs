//! Content Handles
//!
//! A [`ContentHandle`] stands in for the binary payload of one content property.
//! It carries the format metadata (mimetype, encoding, size, fetch URL), a
//! dirty flag and at most one pending payload.
//!
//! # Lifecycle
//!
//! - **Populated lazily**: handles created while a node's properties are
//!   fetched start unpopulated. Metadata is read from the repository on first
//!   access, and only when the owner is a persisted node.
//! - **Created dirty**: handles installed through `update_content` are dirty and
//!   populated from the start; they are never fetched.
//!
//! After a successful save the handle is reset to a clean, unpopulated state so
//! the next access reads the metadata the server now holds.
//!
//! # Content references
//!
//! The repository reports content properties as a reference string:
//!
//! ```text
//! contentUrl=store://2024/5/1/abc.bin|mimetype=text/plain|size=11|encoding=UTF-8|locale=en_US_
//! ```
//!
//! [`ContentReference`] parses that form.

use crate::models::NodeRef;
use crate::operations::{
    ContentFormat, GraphError, Predicate, Result, Statements, UpdateStatement, Uploader,
    WriteContentStatement,
};
use crate::remote::{ContentRecord, PropertyRecord};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Pending payload of a dirty handle; the last write wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Parsed content reference property value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentReference {
    pub url: String,
    pub mimetype: Option<String>,
    pub size: Option<u64>,
    pub encoding: Option<String>,
    pub locale: Option<String>,
}

impl ContentReference {
    const URL_KEY: &'static str = "contentUrl=";

    /// Cheap check used while classifying fetched property values
    pub fn is_reference(value: &str) -> bool {
        value.starts_with(Self::URL_KEY)
    }

    /// Parse a `contentUrl=..|mimetype=..|...` string; `None` if it is not one
    pub fn parse(value: &str) -> Option<Self> {
        if !Self::is_reference(value) {
            return None;
        }

        let mut reference = ContentReference::default();
        for part in value.split('|') {
            let Some((key, raw)) = part.split_once('=') else {
                continue;
            };
            let raw = raw.trim();
            match key {
                "contentUrl" => reference.url = raw.to_string(),
                "mimetype" if !raw.is_empty() => reference.mimetype = Some(raw.to_string()),
                "size" => reference.size = raw.parse::<u64>().ok(),
                "encoding" if !raw.is_empty() => reference.encoding = Some(raw.to_string()),
                "locale" if !raw.is_empty() => reference.locale = Some(raw.to_string()),
                _ => {}
            }
        }
        Some(reference)
    }
}

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contentUrl={}", self.url)?;
        if let Some(mimetype) = &self.mimetype {
            write!(f, "|mimetype={}", mimetype)?;
        }
        if let Some(size) = self.size {
            write!(f, "|size={}", size)?;
        }
        if let Some(encoding) = &self.encoding {
            write!(f, "|encoding={}", encoding)?;
        }
        if let Some(locale) = &self.locale {
            write!(f, "|locale={}", locale)?;
        }
        Ok(())
    }
}

/// Lazily populated proxy for one property's binary content
#[derive(Debug, Clone, PartialEq)]
pub struct ContentHandle {
    owner: Option<NodeRef>,
    property: String,
    mimetype: Option<String>,
    encoding: Option<String>,
    size: Option<u64>,
    url: Option<String>,
    is_populated: bool,
    is_dirty: bool,
    pending: Option<ContentSource>,
}

impl ContentHandle {
    /// Handle for a content property found during population
    pub fn unpopulated(owner: NodeRef, property: impl Into<String>) -> Self {
        Self {
            owner: Some(owner),
            property: property.into(),
            mimetype: None,
            encoding: None,
            size: None,
            url: None,
            is_populated: false,
            is_dirty: false,
            pending: None,
        }
    }

    /// Fresh dirty handle; owner and property are filled in when it is installed
    pub fn new(mimetype: impl Into<String>, encoding: Option<String>) -> Self {
        Self {
            owner: None,
            property: String::new(),
            mimetype: Some(mimetype.into()),
            encoding,
            size: None,
            url: None,
            is_populated: true,
            is_dirty: true,
            pending: None,
        }
    }

    /// Preload the payload (builder style)
    pub fn with_bytes(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.set_content(content);
        self
    }

    pub(crate) fn set_owner(&mut self, owner: NodeRef, property: impl Into<String>) {
        self.owner = Some(owner);
        self.property = property.into();
    }

    pub fn owner(&self) -> Option<NodeRef> {
        self.owner
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Raw fetch URL, without credentials
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn is_populated(&self) -> bool {
        self.is_populated
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn pending(&self) -> Option<&ContentSource> {
        self.pending.as_ref()
    }

    /// Whether metadata still has to be read; never for handles of new owners
    pub fn needs_population(&self, owner_is_new: bool) -> bool {
        !self.is_populated && self.owner.is_some() && !self.property.is_empty() && !owner_is_new
    }

    /// Take metadata from a content read; absent fields stay unset
    pub fn apply_record(&mut self, record: Option<ContentRecord>) {
        if let Some(record) = record {
            if record.length.is_some() {
                self.size = record.length;
            }
            if record.mimetype.is_some() {
                self.mimetype = record.mimetype;
            }
            if record.encoding.is_some() {
                self.encoding = record.encoding;
            }
            if record.url.is_some() {
                self.url = record.url;
            }
        }
        self.is_populated = true;
    }

    pub fn set_mimetype(&mut self, mimetype: impl Into<String>) {
        self.mimetype = Some(mimetype.into());
    }

    pub fn set_encoding(&mut self, encoding: Option<String>) {
        self.encoding = encoding;
    }

    /// Replace the payload with in-memory bytes
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.is_dirty = true;
        self.pending = Some(ContentSource::Bytes(content.into()));
    }

    /// Replace the payload with the contents of a local file, read at save time
    pub fn write_from_file(&mut self, path: impl AsRef<Path>) {
        self.is_dirty = true;
        self.pending = Some(ContentSource::File(path.as_ref().to_path_buf()));
    }

    /// `url?ticket=<ticket>`
    pub fn ticket_url(&self, ticket: &str) -> Option<String> {
        self.url.as_ref().map(|url| format!("{}?ticket={}", url, ticket))
    }

    /// `url?guest=true`
    pub fn guest_url(&self) -> Option<String> {
        self.url.as_ref().map(|url| format!("{}?guest=true", url))
    }

    /// Bytes of the pending payload, if the handle is dirty
    pub async fn pending_bytes(&self) -> Result<Option<Vec<u8>>> {
        if !self.is_dirty {
            return Ok(None);
        }
        match &self.pending {
            Some(ContentSource::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(ContentSource::File(path)) => Ok(Some(tokio::fs::read(path).await?)),
            None => Ok(None),
        }
    }

    /// Contribute this handle's statement to a save batch
    ///
    /// File payloads are uploaded here and referenced by an `update`; byte
    /// payloads travel inline in a `writeContent`. Clean handles contribute
    /// nothing.
    pub async fn on_before_save(
        &self,
        target: &Predicate,
        statements: &mut Statements,
        uploader: &Uploader<'_>,
    ) -> Result<()> {
        if !self.is_dirty {
            return Ok(());
        }

        let Some(mimetype) = self.mimetype.as_deref() else {
            return Err(GraphError::validation(format!(
                "a mimetype for content property '{}' on node {} must be set",
                self.property, target
            )));
        };

        match &self.pending {
            Some(ContentSource::File(path)) => {
                let token = uploader
                    .upload_file(path, mimetype, self.encoding.as_deref())
                    .await?;
                statements.update.push(UpdateStatement {
                    target: target.clone(),
                    properties: vec![PropertyRecord {
                        name: self.property.clone(),
                        is_multi_value: false,
                        value: Value::String(token),
                    }],
                });
            }
            Some(ContentSource::Bytes(bytes)) => {
                statements.write_content.push(WriteContentStatement {
                    target: target.clone(),
                    property: self.property.clone(),
                    content: bytes.clone(),
                    format: ContentFormat {
                        mimetype: mimetype.to_string(),
                        encoding: self.encoding.clone(),
                    },
                });
            }
            None => {
                statements.write_content.push(WriteContentStatement {
                    target: target.clone(),
                    property: self.property.clone(),
                    content: Vec::new(),
                    format: ContentFormat {
                        mimetype: mimetype.to_string(),
                        encoding: self.encoding.clone(),
                    },
                });
            }
        }
        Ok(())
    }

    /// Reset to a clean handle that re-reads its metadata on next access
    pub fn on_after_save(&mut self) {
        self.is_dirty = false;
        self.is_populated = false;
        self.mimetype = None;
        self.encoding = None;
        self.size = None;
        self.url = None;
        self.pending = None;
    }
}
