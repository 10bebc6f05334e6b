//! Utility types shared across the crate

mod namespace;

pub use namespace::NamespaceMap;
