//! Data Models
//!
//! Value types and change-tracked state of the client-side graph:
//!
//! - [`Identity`] / [`StoreRef`] - address of a repository node
//! - [`NodeRef`] - session-local handle to a live node
//! - [`ChildAssociation`] / [`Association`] - relation records
//! - [`PropertyValue`] / [`ContentHandle`] - property values and content proxies
//! - [`NodeState`] - populated state and pending edits of one node
//! - [`Version`] - reference to a version snapshot

mod content;
mod identity;
mod node;
mod property;
mod relation;
mod version;

pub use content::{ContentHandle, ContentReference, ContentSource};
pub use identity::{Identity, NodeRef, ReferenceParseError, StoreRef};
pub use node::{EdgeRemoval, NodeState};
pub use property::PropertyValue;
pub use relation::{Association, ChildAssociation};
pub use version::Version;
