use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use colstore_types::{CollectionName, DocumentId, Fields, Query, QuerySnapshot};

use crate::error::RemoteResult;

/// Callback invoked with each pushed snapshot, or with the error that ended
/// the listen stream.
pub type SnapshotListener = Arc<dyn Fn(RemoteResult<QuerySnapshot>) + Send + Sync>;

/// Remote document-collection service.
///
/// Implementations must satisfy these rules:
/// - `set_document` is a full-document upsert: any existing document with the
///   same id is replaced, not merged.
/// - `listen` delivers the current query result, then again every time the
///   result changes, in the order the changes were applied. A listener
///   never receives an older result after a newer one.
/// - A listener that receives `Err` has been removed by the service and will
///   receive nothing further.
/// - Listeners are never called while the service holds internal locks.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create or replace a document.
    ///
    /// With `id == None` the service assigns a fresh identifier. Returns the
    /// identifier that was written.
    async fn set_document(
        &self,
        collection: &CollectionName,
        id: Option<&DocumentId>,
        fields: Fields,
    ) -> RemoteResult<DocumentId>;

    /// Delete a document. Returns `true` if it existed.
    async fn delete_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> RemoteResult<bool>;

    /// One-shot evaluation of `query`.
    async fn run_query(&self, query: &Query) -> RemoteResult<QuerySnapshot>;

    /// Open a live query.
    fn listen(&self, query: &Query, listener: SnapshotListener)
        -> RemoteResult<ListenerRegistration>;
}

/// Handle to an open live query.
///
/// [`remove`](Self::remove) detaches the listener. It is idempotent and safe
/// to call from inside the listener itself. Dropping the registration
/// without calling `remove` leaves the listener attached.
pub struct ListenerRegistration {
    id: u64,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerRegistration {
    pub fn new(id: u64, detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            detach: Mutex::new(Some(Box::new(detach))),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn remove(&self) {
        let detach = self.detach.lock().expect("registration lock poisoned").take();
        if let Some(detach) = detach {
            detach();
        }
    }

    /// `false` once [`remove`](Self::remove) has been called.
    pub fn is_active(&self) -> bool {
        self.detach
            .lock()
            .expect("registration lock poisoned")
            .is_some()
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
