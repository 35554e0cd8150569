use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::debug;

use depot_payload::{Attachment, PayloadObject};
use depot_store::{BlobStore, ContentResolver, StoreResult};
use depot_types::{BlobId, ContentId, NamespaceId};

use crate::error::{ResolveError, ResolveResult};

/// The result of walking a payload's attachment graph to completion.
///
/// `resolved` may contain duplicates when the same blob is reachable through
/// several paths; callers that need a set should use [`unique_blobs`].
///
/// [`unique_blobs`]: ResolveOutcome::unique_blobs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Every blob the walk yielded, in discovery order.
    pub resolved: Vec<BlobId>,
    /// Content IDs whose chunking-layer mapping was absent or empty.
    pub unresolved_contents: Vec<ContentId>,
    /// Object-attachment blobs that could not be fetched.
    pub missing_blobs: Vec<BlobId>,
    /// Distinct child objects fetched and parsed. Diamond paths to the same
    /// child count once.
    pub objects_fetched: usize,
}

impl ResolveOutcome {
    /// Returns `true` if every reference resolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved_contents.is_empty() && self.missing_blobs.is_empty()
    }

    /// The yielded blobs as a deduplicated set.
    pub fn unique_blobs(&self) -> HashSet<BlobId> {
        self.resolved.iter().copied().collect()
    }

    /// Map the outcome onto the typed failure taxonomy: unresolved content
    /// IDs first, then missing blobs, otherwise the yielded closure.
    pub fn into_result(self) -> ResolveResult<Vec<BlobId>> {
        if !self.unresolved_contents.is_empty() {
            return Err(ResolveError::UnresolvedContentIds {
                contents: self.unresolved_contents,
            });
        }
        if !self.missing_blobs.is_empty() {
            return Err(ResolveError::MissingBlobs {
                blobs: self.missing_blobs,
            });
        }
        Ok(self.resolved)
    }
}

type ContentJob = BoxFuture<'static, (ContentId, StoreResult<Option<Vec<BlobId>>>)>;
type FetchJob = BoxFuture<'static, (BlobId, StoreResult<Option<bytes::Bytes>>)>;

/// Walks attachment graphs against the blob store and the chunking layer's
/// content resolver.
pub struct ReferenceResolver {
    blobs: Arc<dyn BlobStore>,
    contents: Arc<dyn ContentResolver>,
}

impl ReferenceResolver {
    pub fn new(blobs: Arc<dyn BlobStore>, contents: Arc<dyn ContentResolver>) -> Self {
        Self { blobs, contents }
    }

    /// Resolve the full reference closure of `root` within `ns`.
    ///
    /// The walk keeps a queue of payload objects to visit and two sets of
    /// in-flight operations: content-ID resolutions and child-object
    /// fetches. Direct blob attachments are yielded as encountered; content
    /// indirections and child objects complete asynchronously and feed back
    /// into the outcome or the visit queue. A visited set keyed by blob ID
    /// ensures a child reached through several paths is fetched once and
    /// that data-level cycles terminate.
    ///
    /// Store I/O failures and undecodable child payloads abort the walk with
    /// an error; absent content mappings and missing child blobs do not:
    /// they are recorded on the outcome.
    pub async fn resolve(
        &self,
        ns: &NamespaceId,
        root: &PayloadObject,
    ) -> ResolveResult<ResolveOutcome> {
        let mut outcome = ResolveOutcome::default();
        let mut queue: VecDeque<PayloadObject> = VecDeque::new();
        let mut visited: HashSet<BlobId> = HashSet::new();
        let mut content_jobs: FuturesUnordered<ContentJob> = FuturesUnordered::new();
        let mut fetch_jobs: FuturesUnordered<FetchJob> = FuturesUnordered::new();

        queue.push_back(root.clone());

        loop {
            // Drain the visit queue, yielding direct attachments and spawning
            // asynchronous work for the indirect ones.
            while let Some(object) = queue.pop_front() {
                for attachment in object.attachments() {
                    match attachment {
                        Attachment::Blob(id) => outcome.resolved.push(id),
                        Attachment::Content(content) => {
                            let resolver = Arc::clone(&self.contents);
                            let ns = ns.clone();
                            content_jobs.push(Box::pin(async move {
                                (content, resolver.resolve(&ns, content).await)
                            }));
                        }
                        Attachment::Object(blob) => {
                            if visited.insert(blob) {
                                let store = Arc::clone(&self.blobs);
                                let ns = ns.clone();
                                fetch_jobs.push(Box::pin(async move {
                                    (blob, store.get(&ns, blob).await)
                                }));
                            }
                        }
                    }
                }
            }

            tokio::select! {
                Some((content, result)) = content_jobs.next() => match result? {
                    Some(blobs) if !blobs.is_empty() => outcome.resolved.extend(blobs),
                    _ => {
                        debug!(content = %content.short_hex(), "content id did not resolve");
                        outcome.unresolved_contents.push(content);
                    }
                },
                Some((blob, result)) = fetch_jobs.next() => match result? {
                    Some(bytes) => {
                        let child = PayloadObject::decode(&bytes)
                            .map_err(|source| ResolveError::CorruptAttachment { blob, source })?;
                        outcome.objects_fetched += 1;
                        queue.push_back(child);
                    }
                    None => {
                        debug!(blob = %blob.short_hex(), "object attachment blob missing");
                        outcome.missing_blobs.push(blob);
                    }
                },
                // Queue empty and nothing in flight: the walk is drained.
                else => break,
            }
        }

        Ok(outcome)
    }
}
