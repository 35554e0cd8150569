use serde::{Deserialize, Serialize};

use depot_types::{BlobId, ContentId};

use crate::error::{PayloadError, PayloadResult};

/// An attachment field referencing content stored outside the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attachment {
    /// Direct reference to a blob by content hash.
    Blob(BlobId),
    /// Binary attachment behind a content-ID indirection. The chunking layer
    /// resolves it to one or more blobs; the mapping may be absent.
    Content(ContentId),
    /// Reference to a blob whose bytes decode as a nested [`PayloadObject`].
    /// Its own attachments are resolved transitively.
    Object(BlobId),
}

/// A field value: an inline scalar, a nested sub-tree, or an attachment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    Bytes(Vec<u8>),
    Attachment(Attachment),
    /// Inline sub-object; its fields are part of this payload, not a
    /// separate stored blob.
    Nested(PayloadObject),
}

/// A single named field in a payload object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A payload object: the tree of fields stored as a reference record's
/// content.
///
/// The resolver walks [`attachments`] to compute the closure of referenced
/// blobs; everything else is opaque to the store.
///
/// [`attachments`]: PayloadObject::attachments
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadObject {
    pub fields: Vec<Field>,
}

impl PayloadObject {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder-style.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    /// Append a direct blob attachment field.
    pub fn with_blob_attachment(self, name: impl Into<String>, blob: BlobId) -> Self {
        self.with_field(name, FieldValue::Attachment(Attachment::Blob(blob)))
    }

    /// Append a content-ID binary attachment field.
    pub fn with_content_attachment(self, name: impl Into<String>, content: ContentId) -> Self {
        self.with_field(name, FieldValue::Attachment(Attachment::Content(content)))
    }

    /// Append an object attachment field referencing a stored payload blob.
    pub fn with_object_attachment(self, name: impl Into<String>, blob: BlobId) -> Self {
        self.with_field(name, FieldValue::Attachment(Attachment::Object(blob)))
    }

    /// All attachments in this payload, including those inside nested
    /// sub-objects. Attachments of [`Attachment::Object`] targets are *not*
    /// included; following them is the resolver's job.
    pub fn attachments(&self) -> Vec<Attachment> {
        let mut out = Vec::new();
        collect_attachments(self, &mut out);
        out
    }

    /// Returns `true` if this payload has no attachment fields anywhere in
    /// its field tree.
    pub fn has_no_attachments(&self) -> bool {
        self.attachments().is_empty()
    }

    /// Encode to storage bytes.
    pub fn encode(&self) -> PayloadResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PayloadError::Encode(e.to_string()))
    }

    /// Decode from storage bytes.
    pub fn decode(data: &[u8]) -> PayloadResult<Self> {
        bincode::deserialize(data).map_err(|e| PayloadError::Decode(e.to_string()))
    }

    /// The content hash of the encoded payload. This is the blob identity of
    /// the record's own payload blob.
    pub fn blob_id(&self) -> PayloadResult<BlobId> {
        Ok(BlobId::from_bytes(&self.encode()?))
    }
}

fn collect_attachments(obj: &PayloadObject, out: &mut Vec<Attachment>) {
    for field in &obj.fields {
        match &field.value {
            FieldValue::Attachment(att) => out.push(*att),
            FieldValue::Nested(nested) => collect_attachments(nested, out),
            _ => {}
        }
    }
}
