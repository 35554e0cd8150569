//! Reference resolution for depot payloads.
//!
//! [`ReferenceResolver`] walks a payload's attachment graph and computes the
//! closure of referenced blobs: direct blob attachments, blobs behind
//! content-ID indirections, and, transitively, the attachments of nested
//! object attachments. The walk is concurrent over I/O and tolerates diamond
//! shapes and data-level cycles through a visited set.
//!
//! The outcome is data, not control flow: [`ResolveOutcome`] carries the
//! blobs yielded so far alongside any unresolved content IDs and missing
//! object-attachment blobs, and [`ResolveOutcome::into_result`] maps it to
//! the two typed failures callers branch on.

pub mod error;
pub mod resolver;

pub use error::{ResolveError, ResolveResult};
pub use resolver::{ReferenceResolver, ResolveOutcome};
