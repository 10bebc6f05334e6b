//! Remote Repository Layer
//!
//! The graph's view of the outside world:
//!
//! - [`RepositoryService`] - node reads, relation queries, batch submission,
//!   versioning
//! - [`ContentTransport`] - raw upload and download of content payloads
//! - [`records`] - the structured records both sides exchange
//! - [`InMemoryRepository`] - process-local implementation of both traits
//! - [`HttpContentTransport`] - content transfer over HTTP(S)

pub mod error;
pub mod memory;
pub mod records;
pub mod service;
pub mod transport;

pub use error::RemoteError;
pub use memory::InMemoryRepository;
pub use records::{
    columns, AssociationDirection, AssociationFilter, BatchOutcome, ContentRecord, NamedValue,
    NodeRecord, PropertyRecord, ResultRow, ResultSet, VersionInfo,
};
pub use service::RepositoryService;
pub use transport::{ContentTransport, HttpContentTransport, UploadBody, UploadRequest};
