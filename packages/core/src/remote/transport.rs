//! Raw Content Transfer
//!
//! Binary payloads do not travel inside batch statements when they come from a
//! file: the file is first streamed to the repository's upload endpoint, which
//! answers with a content reference token (`contentUrl=...|mimetype=...`) that a
//! later `update` statement stores in the content property.
//!
//! [`HttpContentTransport`] performs that transfer with `reqwest`, feeding the
//! request body from the payload reader in `upload_chunk_size` chunks. The
//! reader and the connection are owned by the call and released on every exit
//! path, including failures halfway through the body.

use crate::config::RepositoryConfig;
use crate::remote::RemoteError;
use async_trait::async_trait;
use reqwest::{header, Body, Client, StatusCode, Url};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Owned payload reader handed to [`ContentTransport::upload`]
pub type UploadBody = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Description of one upload; the bytes themselves are passed as a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file_name: String,
    pub length: u64,
    pub mimetype: Option<String>,
    pub encoding: Option<String>,
}

/// Byte-stream primitive for content payloads
#[async_trait]
pub trait ContentTransport: Send + Sync {
    /// Stream `body` (exactly `request.length` bytes) to the repository and
    /// return the content reference token it issues
    async fn upload(
        &self,
        config: &RepositoryConfig,
        request: &UploadRequest,
        body: UploadBody,
    ) -> Result<String, RemoteError>;

    /// Fetch the bytes behind a content URL
    async fn download(&self, config: &RepositoryConfig, url: &str)
        -> Result<Vec<u8>, RemoteError>;
}

/// HTTP(S) content transfer against the repository's upload and download
/// servlets
#[derive(Debug, Clone, Default)]
pub struct HttpContentTransport {
    client: Client,
}

impl HttpContentTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, timeouts, certificates)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Upload endpoint for `file_name`: `<scheme>://<host>/<context>/upload/<name>`
///
/// The context is the first path segment of the connection URL.
pub fn upload_url(config: &RepositoryConfig, file_name: &str) -> Result<Url, RemoteError> {
    let mut url = config
        .base_url()
        .map_err(|e| RemoteError::transport(e.to_string()))?;
    let context = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string);

    url.path_segments_mut()
        .map_err(|_| {
            RemoteError::transport(format!("{} cannot carry a path", config.connection_url))
        })?
        .clear()
        .extend(context.as_deref())
        .push("upload")
        .push(file_name);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[async_trait]
impl ContentTransport for HttpContentTransport {
    async fn upload(
        &self,
        config: &RepositoryConfig,
        request: &UploadRequest,
        body: UploadBody,
    ) -> Result<String, RemoteError> {
        let url = upload_url(config, &request.file_name)?;
        let mut query = vec![("ticket", config.ticket.as_str())];
        if let Some(mimetype) = &request.mimetype {
            query.push(("mimetype", mimetype.as_str()));
        }
        if let Some(encoding) = &request.encoding {
            query.push(("encoding", encoding.as_str()));
        }
        tracing::debug!(
            "Uploading '{}' ({} bytes) to {}",
            request.file_name,
            request.length,
            url
        );

        let chunks = ReaderStream::with_capacity(body, config.upload_chunk_size.max(1));
        let response = self
            .client
            .put(url)
            .query(&query)
            .header(header::CONTENT_LENGTH, request.length)
            .body(Body::wrap_stream(chunks))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::rejected(
                "upload",
                format!("HTTP {}: {}", status.as_u16(), text.trim()),
            ));
        }

        let index = text
            .find("contentUrl")
            .ok_or_else(|| RemoteError::malformed("upload response carries no contentUrl"))?;
        let token = text[index..].trim().to_string();
        tracing::debug!("Upload of '{}' complete", request.file_name);
        Ok(token)
    }

    async fn download(
        &self,
        _config: &RepositoryConfig,
        url: &str,
    ) -> Result<Vec<u8>, RemoteError> {
        let target =
            Url::parse(url).map_err(|e| RemoteError::transport(format!("{}: {}", url, e)))?;
        let response = self.client.get(target).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(RemoteError::not_found(url)),
            status if !status.is_success() => Err(RemoteError::rejected(
                "download",
                format!("HTTP {}", status.as_u16()),
            )),
            _ => Ok(response.bytes().await?.to_vec()),
        }
    }
}
