//! Graph Operations
//!
//! Everything a save needs beyond the node model itself:
//!
//! - [`statements`] - the eight statement kinds and the grouped batch shape
//! - [`batch`] - building, submitting and committing one unit of work
//! - [`error`] - the [`GraphError`] taxonomy shared by all session operations

pub mod batch;
pub mod error;
pub mod statements;

pub use batch::{BatchBuilder, ChangeBatch, Uploader};
pub use error::{GraphError, Result};
pub use statements::{
    AddChildStatement, AspectStatement, ContentFormat, CreateAssociationStatement,
    CreateStatement, ParentLink, Predicate, RemoveChildStatement, StatementKind, Statements,
    UpdateStatement, WriteContentStatement,
};
