//! In-memory document service for tests, demos, and embedding.
//!
//! [`InMemoryDocumentService`] keeps every collection in a `BTreeMap` keyed
//! by document id and pushes snapshots to live queries synchronously, on
//! the thread that performed the write. Pushes are queued in the order they
//! are computed and delivered one at a time, so a live query never sees an
//! older result after a newer one. It also carries hooks for driving
//! failure paths: rejected writes and revoked listeners.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use colstore_types::{CollectionName, Document, DocumentId, Fields, Query, QuerySnapshot};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RemoteError, RemoteResult};
use crate::service::{DocumentService, ListenerRegistration, SnapshotListener};

/// A write accepted by the service, in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub struct WriteRecord {
    pub collection: CollectionName,
    pub id: DocumentId,
    pub fields: Fields,
    /// `true` if the service assigned `id`.
    pub auto_id: bool,
}

struct ListenTarget {
    id: u64,
    query: Query,
    listener: SnapshotListener,
    /// Result last pushed to this target; unchanged results are not re-sent.
    last: Vec<Document>,
}

/// A computed push waiting to be handed to its listener.
struct Push {
    target: u64,
    listener: SnapshotListener,
    event: RemoteResult<QuerySnapshot>,
}

#[derive(Default)]
struct State {
    collections: RwLock<HashMap<CollectionName, BTreeMap<DocumentId, Document>>>,
    targets: RwLock<Vec<ListenTarget>>,
    writes: Mutex<Vec<WriteRecord>>,
    reject: RwLock<Option<RemoteError>>,
    next_target: AtomicU64,
    /// Pushes in the order they were computed. Only pushed to while the
    /// target lock is held.
    pending: Mutex<VecDeque<Push>>,
    delivering: AtomicBool,
}

impl State {
    fn evaluate(&self, query: &Query) -> Vec<Document> {
        let collections = self.collections.read().expect("collection lock poisoned");
        match collections.get(query.collection()) {
            Some(docs) => query.execute(docs.values()),
            None => Vec::new(),
        }
    }

    /// Queue fresh results for every live query on `collection` whose result
    /// changed, then deliver.
    fn broadcast(&self, collection: &CollectionName) {
        {
            let mut targets = self.targets.write().expect("target lock poisoned");
            let collections = self.collections.read().expect("collection lock poisoned");
            let docs = collections.get(collection);
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            for t in targets
                .iter_mut()
                .filter(|t| t.query.collection() == collection)
            {
                let result = match docs {
                    Some(docs) => t.query.execute(docs.values()),
                    None => Vec::new(),
                };
                if result == t.last {
                    continue;
                }
                t.last = result.clone();
                debug!(%collection, listener_id = t.id, count = result.len(), "snapshot queued");
                pending.push_back(Push {
                    target: t.id,
                    listener: Arc::clone(&t.listener),
                    event: Ok(QuerySnapshot::new(result)),
                });
            }
        }
        self.deliver();
    }

    /// Hand queued pushes to their listeners, oldest first.
    ///
    /// One caller delivers at a time. A caller that finds delivery already
    /// running, on another thread or further up its own stack, leaves its
    /// pushes to that caller. No lock is held while a listener runs.
    fn deliver(&self) {
        loop {
            if self
                .delivering
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }
            {
                let _guard = DeliveryGuard(&self.delivering);
                loop {
                    let next = self.pending.lock().expect("pending lock poisoned").pop_front();
                    let Some(push) = next else { break };
                    // Snapshots for a target detached after queueing are dropped.
                    if push.event.is_ok() && !self.is_registered(push.target) {
                        continue;
                    }
                    (push.listener)(push.event);
                }
            }
            if self.pending.lock().expect("pending lock poisoned").is_empty() {
                return;
            }
        }
    }

    fn is_registered(&self, id: u64) -> bool {
        self.targets
            .read()
            .expect("target lock poisoned")
            .iter()
            .any(|t| t.id == id)
    }

    fn check_writable(&self) -> RemoteResult<()> {
        match self.reject.read().expect("reject lock poisoned").as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn remove_target(&self, id: u64) {
        self.targets
            .write()
            .expect("target lock poisoned")
            .retain(|t| t.id != id);
        debug!(listener_id = id, "listener detached");
    }
}

/// Clears the delivering flag even if a listener panics.
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// In-memory implementation of [`DocumentService`].
///
/// Cloning yields another handle to the same data.
#[derive(Clone, Default)]
pub struct InMemoryDocumentService {
    state: Arc<State>,
}

impl InMemoryDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a service from a JSON seed of the form
    /// `{ "<collection>": { "<id>": { ...fields } } }`.
    pub fn from_seed(seed: &Value) -> RemoteResult<Self> {
        let service = Self::new();
        let collections = seed.as_object().ok_or_else(|| {
            RemoteError::InvalidArgument("seed must be an object of collections".into())
        })?;
        for (name, docs) in collections {
            let collection = CollectionName::new(name.as_str())?;
            let docs = docs.as_object().ok_or_else(|| {
                RemoteError::InvalidArgument(format!("collection {name} must be an object"))
            })?;
            for (id, fields) in docs {
                let fields = fields.as_object().cloned().ok_or_else(|| {
                    RemoteError::InvalidArgument(format!("document {name}/{id} must be an object"))
                })?;
                service.insert(&collection, DocumentId::new(id.as_str())?, fields);
            }
        }
        Ok(service)
    }

    /// Server-side write: stores the document and notifies live queries
    /// without going through the write log or the rejection hook.
    pub fn insert(&self, collection: &CollectionName, id: DocumentId, fields: Fields) {
        self.state
            .collections
            .write()
            .expect("collection lock poisoned")
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), Document::new(id, fields));
        self.state.broadcast(collection);
    }

    /// Server-side delete. Returns `true` if the document existed.
    pub fn remove(&self, collection: &CollectionName, id: &DocumentId) -> bool {
        let existed = self
            .state
            .collections
            .write()
            .expect("collection lock poisoned")
            .get_mut(collection)
            .is_some_and(|docs| docs.remove(id).is_some());
        if existed {
            self.state.broadcast(collection);
        }
        existed
    }

    /// All documents of `collection`, ordered by id.
    pub fn documents(&self, collection: &CollectionName) -> Vec<Document> {
        self.state
            .collections
            .read()
            .expect("collection lock poisoned")
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Accepted client writes, in arrival order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.writes.lock().expect("write log poisoned").clone()
    }

    /// Make every client write and delete fail with `error` until cleared
    /// with `None`.
    pub fn reject_writes(&self, error: Option<RemoteError>) {
        *self.state.reject.write().expect("reject lock poisoned") = error;
    }

    /// Deliver `error` to every live query on `collection` and revoke them.
    ///
    /// Returns the number of listeners revoked.
    pub fn fail_listeners(&self, collection: &CollectionName, error: RemoteError) -> usize {
        let revoked = {
            let mut targets = self.state.targets.write().expect("target lock poisoned");
            let mut pending = self.state.pending.lock().expect("pending lock poisoned");
            let before = targets.len();
            targets.retain(|t| {
                if t.query.collection() != collection {
                    return true;
                }
                warn!(%collection, listener_id = t.id, error = %error, "revoking listener");
                pending.push_back(Push {
                    target: t.id,
                    listener: Arc::clone(&t.listener),
                    event: Err(error.clone()),
                });
                false
            });
            before - targets.len()
        };
        self.state.deliver();
        revoked
    }

    /// Number of open live queries.
    pub fn listener_count(&self) -> usize {
        self.state.targets.read().expect("target lock poisoned").len()
    }
}

#[async_trait]
impl DocumentService for InMemoryDocumentService {
    async fn set_document(
        &self,
        collection: &CollectionName,
        id: Option<&DocumentId>,
        fields: Fields,
    ) -> RemoteResult<DocumentId> {
        self.state.check_writable()?;
        let (id, auto_id) = match id {
            Some(id) => (id.clone(), false),
            None => (DocumentId::generate(), true),
        };

        self.state.writes.lock().expect("write log poisoned").push(WriteRecord {
            collection: collection.clone(),
            id: id.clone(),
            fields: fields.clone(),
            auto_id,
        });
        debug!(%collection, %id, auto_id, "document written");

        self.insert(collection, id.clone(), fields);
        Ok(id)
    }

    async fn delete_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> RemoteResult<bool> {
        self.state.check_writable()?;
        let existed = self.remove(collection, id);
        debug!(%collection, %id, existed, "document deleted");
        Ok(existed)
    }

    async fn run_query(&self, query: &Query) -> RemoteResult<QuerySnapshot> {
        Ok(QuerySnapshot::new(self.state.evaluate(query)))
    }

    fn listen(
        &self,
        query: &Query,
        listener: SnapshotListener,
    ) -> RemoteResult<ListenerRegistration> {
        let id = self.state.next_target.fetch_add(1, Ordering::Relaxed) + 1;
        // Evaluate and queue under the target lock so the initial result is
        // ordered against concurrent writes.
        {
            let mut targets = self.state.targets.write().expect("target lock poisoned");
            let initial = self.state.evaluate(query);
            self.state
                .pending
                .lock()
                .expect("pending lock poisoned")
                .push_back(Push {
                    target: id,
                    listener: Arc::clone(&listener),
                    event: Ok(QuerySnapshot::new(initial.clone())),
                });
            targets.push(ListenTarget {
                id,
                query: query.clone(),
                listener,
                last: initial,
            });
        }
        debug!(collection = %query.collection(), listener_id = id, "listener attached");
        self.state.deliver();

        let weak: Weak<State> = Arc::downgrade(&self.state);
        Ok(ListenerRegistration::new(id, move || {
            if let Some(state) = weak.upgrade() {
                state.remove_target(id);
            }
        }))
    }
}

impl std::fmt::Debug for InMemoryDocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self
            .state
            .collections
            .read()
            .map(|c| c.len())
            .unwrap_or(0);
        f.debug_struct("InMemoryDocumentService")
            .field("collections", &collections)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
