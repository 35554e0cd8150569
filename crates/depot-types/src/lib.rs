//! Foundation types for the depot artifact store.
//!
//! This crate provides the identifier and error types used throughout the
//! depot system. Every other depot crate depends on `depot-types`.
//!
//! # Key Types
//!
//! - [`NamespaceId`] — Tenant/partition scoping all records and blobs
//! - [`BucketId`], [`KeyId`], [`RecordKey`] — Reference-record addressing
//! - [`BlobId`] — Content-addressed blob identifier (BLAKE3 hash)
//! - [`ContentId`] — Indirection identifier from the chunking/dedup layer

pub mod blob;
pub mod content;
pub mod error;
pub mod ids;

pub use blob::BlobId;
pub use content::ContentId;
pub use error::TypeError;
pub use ids::{BucketId, KeyId, NamespaceId, RecordKey};
