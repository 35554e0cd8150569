//! Payload object model for depot reference records.
//!
//! A [`PayloadObject`] is a tree of named fields. Scalar fields carry inline
//! values; attachment fields reference content stored elsewhere:
//!
//! - [`Attachment::Blob`] — a blob referenced directly by its [`BlobId`]
//! - [`Attachment::Content`] — a binary attachment behind a [`ContentId`]
//!   indirection (the chunking layer maps it to one or more blobs)
//! - [`Attachment::Object`] — a blob whose bytes decode as another
//!   `PayloadObject`, whose own attachments are resolved transitively
//!
//! The byte-level wire format is internal (bincode); only the attachment
//! structure is interpreted by the reference resolver.
//!
//! [`BlobId`]: depot_types::BlobId
//! [`ContentId`]: depot_types::ContentId

pub mod error;
pub mod object;

pub use error::{PayloadError, PayloadResult};
pub use object::{Attachment, Field, FieldValue, PayloadObject};
