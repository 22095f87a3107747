use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colstore_reactive::{Readable, Unsubscriber, Writable};
use colstore_remote::{CollectionRef, DocumentClient, ListenerRegistration, RemoteResult};
use colstore_types::{CollectionName, DocumentId, Fields, Query, QuerySnapshot, Record};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::state::SyncState;

/// How a snapshot is published to the list's subscribers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Emission {
    /// Rebuild the list and publish it once.
    #[default]
    Batched,
    /// Publish an empty list, then republish after appending each record:
    /// n + 1 notifications for a snapshot of n documents.
    Incremental,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreOptions {
    pub emission: Emission,
}

/// Replace the contents of `list` with the records of `snapshot`, in
/// snapshot order.
pub fn apply_snapshot(list: &Writable<Vec<Record>>, snapshot: &QuerySnapshot, emission: Emission) {
    match emission {
        Emission::Batched => list.set(snapshot.records()),
        Emission::Incremental => {
            list.set(Vec::new());
            for doc in snapshot {
                let record = doc.to_record();
                list.update(move |current| {
                    let mut next = Vec::with_capacity(current.len() + 1);
                    next.extend_from_slice(current);
                    next.push(record);
                    next
                });
            }
        }
    }
}

/// A remote collection mirrored into an observable list of [`Record`]s.
///
/// The live query is opened on construction and stays open until
/// [`dispose`](Self::dispose) is called or the store is dropped. Every
/// snapshot pushed by the service replaces the list wholesale.
pub struct CollectionStore {
    collection: CollectionRef,
    query: Query,
    list: Writable<Vec<Record>>,
    state: Writable<SyncState>,
    registration: ListenerRegistration,
    disposed: Arc<AtomicBool>,
}

impl CollectionStore {
    /// Mirror every document in `name`.
    pub fn new(client: &DocumentClient, name: &str) -> StoreResult<Self> {
        Self::with_options(client, name, |q| q, StoreOptions::default())
    }

    /// Mirror `shape(query)`, where `query` covers all of `name`.
    ///
    /// `shape` runs exactly once, before the live query is opened.
    pub fn with_query(
        client: &DocumentClient,
        name: &str,
        shape: impl FnOnce(Query) -> Query,
    ) -> StoreResult<Self> {
        Self::with_options(client, name, shape, StoreOptions::default())
    }

    pub fn with_options(
        client: &DocumentClient,
        name: &str,
        shape: impl FnOnce(Query) -> Query,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let name = CollectionName::new(name)?;
        let collection = client.collection_ref(name)?;
        Self::open(collection, shape, options)
    }

    /// Mirror a query over an existing collection handle.
    pub fn open(
        collection: CollectionRef,
        shape: impl FnOnce(Query) -> Query,
        options: StoreOptions,
    ) -> StoreResult<Self> {
        let query = shape(collection.query());
        let list = Writable::new(Vec::new());
        let state = Writable::new(SyncState::Pending);
        let disposed = Arc::new(AtomicBool::new(false));

        let on_snapshot = {
            let list = list.clone();
            let state = state.clone();
            let disposed = Arc::clone(&disposed);
            let name = collection.name().clone();
            let emission = options.emission;
            move |event: RemoteResult<QuerySnapshot>| {
                if disposed.load(Ordering::Acquire) {
                    return;
                }
                match event {
                    Ok(snapshot) => {
                        debug!(collection = %name, documents = snapshot.len(), "applying snapshot");
                        apply_snapshot(&list, &snapshot, emission);
                        state.set(SyncState::Synced {
                            documents: snapshot.len(),
                            read_time: snapshot.read_time,
                        });
                    }
                    Err(err) => {
                        warn!(collection = %name, error = %err, "live query failed");
                        state.set(SyncState::Failed(err));
                    }
                }
            }
        };

        let registration = collection.listen(&query, on_snapshot)?;
        info!(
            collection = %collection.name(),
            shaped = !query.is_unshaped(),
            emission = ?options.emission,
            "collection store opened"
        );

        Ok(Self {
            collection,
            query,
            list,
            state,
            registration,
            disposed,
        })
    }

    /// Register `listener` for list changes. It is called with the current
    /// list immediately.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Vec<Record>) + Send + Sync + 'static,
    ) -> Unsubscriber {
        self.list.subscribe(listener)
    }

    /// Overwrite the list locally, without touching the remote service.
    ///
    /// The next snapshot replaces whatever was set here.
    pub fn set(&self, records: Vec<Record>) {
        self.list.set(records);
    }

    /// Current list value.
    pub fn get(&self) -> Vec<Record> {
        self.list.get()
    }

    pub fn list(&self) -> Readable<Vec<Record>> {
        self.list.readable()
    }

    pub fn state(&self) -> Readable<SyncState> {
        self.state.readable()
    }

    /// The raw collection handle, for operations `send` does not cover.
    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    /// The query the live subscription was opened with.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Write `fields` to the collection.
    ///
    /// With `doc_name` the document of that id is created or fully replaced.
    /// Without it the service assigns an id. Resolves to the written id once
    /// the service acknowledges the write. The list is not touched here; it
    /// changes only when the service pushes the resulting snapshot.
    pub async fn send(&self, fields: Fields, doc_name: Option<&str>) -> StoreResult<DocumentId> {
        let id = doc_name.map(DocumentId::new).transpose()?;
        let written = self.collection.set(id.as_ref(), fields).await?;
        debug!(collection = %self.collection.name(), id = %written, "document sent");
        Ok(written)
    }

    /// Serialize `value` and [`send`](Self::send) it. `value` must serialize
    /// to a JSON object.
    pub async fn send_serialized<T: Serialize + ?Sized>(
        &self,
        value: &T,
        doc_name: Option<&str>,
    ) -> StoreResult<DocumentId> {
        let fields = match serde_json::to_value(value) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(StoreError::Serialization(format!(
                    "document must serialize to an object, got {other}"
                )))
            }
            Err(e) => return Err(StoreError::Serialization(e.to_string())),
        };
        self.send(fields, doc_name).await
    }

    /// Close the live query. Idempotent; also runs on drop.
    ///
    /// The list keeps its last value and still accepts [`set`](Self::set).
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registration.remove();
        self.state.set(SyncState::Disposed);
        info!(collection = %self.collection.name(), "collection store disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for CollectionStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionStore")
            .field("collection", self.collection.name())
            .field("query", &self.query)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use colstore_remote::{
        ClientConfig, DocumentService, InMemoryDocumentService, RemoteError, SnapshotListener,
    };
    use colstore_types::{Direction, Document, FilterOp};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn doc(id: &str, value: Value) -> Document {
        Document::new(DocumentId::new(id).unwrap(), fields(value))
    }

    fn values(records: &[Record]) -> Vec<Value> {
        records.iter().cloned().map(Record::into_value).collect()
    }

    /// Service whose snapshots are pushed by hand and whose writes are only
    /// recorded.
    #[derive(Default)]
    struct ScriptedService {
        listeners: Mutex<Vec<(Query, SnapshotListener)>>,
        sets: Mutex<Vec<(CollectionName, Option<DocumentId>, Fields)>>,
        detached: Arc<AtomicUsize>,
    }

    impl ScriptedService {
        fn push(&self, docs: Vec<Document>) {
            let listeners: Vec<SnapshotListener> = self
                .listeners
                .lock()
                .unwrap()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            for listener in listeners {
                listener(Ok(QuerySnapshot::new(docs.clone())));
            }
        }

        fn fail(&self, error: RemoteError) {
            let listeners: Vec<SnapshotListener> = self
                .listeners
                .lock()
                .unwrap()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            for listener in listeners {
                listener(Err(error.clone()));
            }
        }
    }

    #[async_trait]
    impl DocumentService for ScriptedService {
        async fn set_document(
            &self,
            collection: &CollectionName,
            id: Option<&DocumentId>,
            fields: Fields,
        ) -> RemoteResult<DocumentId> {
            self.sets
                .lock()
                .unwrap()
                .push((collection.clone(), id.cloned(), fields));
            Ok(id.cloned().unwrap_or_else(DocumentId::generate))
        }

        async fn delete_document(
            &self,
            _collection: &CollectionName,
            _id: &DocumentId,
        ) -> RemoteResult<bool> {
            Ok(false)
        }

        async fn run_query(&self, _query: &Query) -> RemoteResult<QuerySnapshot> {
            Ok(QuerySnapshot::new(Vec::new()))
        }

        fn listen(
            &self,
            query: &Query,
            listener: SnapshotListener,
        ) -> RemoteResult<ListenerRegistration> {
            let mut listeners = self.listeners.lock().unwrap();
            listeners.push((query.clone(), listener));
            let detached = Arc::clone(&self.detached);
            Ok(ListenerRegistration::new(listeners.len() as u64, move || {
                detached.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }

    fn scripted() -> (DocumentClient, Arc<ScriptedService>) {
        let service = Arc::new(ScriptedService::default());
        let client = DocumentClient::new(ClientConfig::default(), service.clone()).unwrap();
        (client, service)
    }

    fn in_memory() -> (DocumentClient, InMemoryDocumentService) {
        let service = InMemoryDocumentService::new();
        let client =
            DocumentClient::new(ClientConfig::default(), Arc::new(service.clone())).unwrap();
        (client, service)
    }

    fn recorder(store: &CollectionStore) -> (Arc<Mutex<Vec<Vec<Record>>>>, Unsubscriber) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let unsub = store.subscribe(move |list| sink.lock().unwrap().push(list.clone()));
        (seen, unsub)
    }

    fn users() -> CollectionName {
        CollectionName::new("users").unwrap()
    }

    // -----------------------------------------------------------------------
    // Snapshot mirroring
    // -----------------------------------------------------------------------

    #[test]
    fn users_scenario() {
        let (client, service) = in_memory();
        service.insert(&users(), DocumentId::new("u1").unwrap(), fields(json!({"name": "Ann"})));
        service.insert(&users(), DocumentId::new("u2").unwrap(), fields(json!({"name": "Bo"})));

        let store = CollectionStore::new(&client, "users").unwrap();
        let (seen, _unsub) = recorder(&store);

        let expected = vec![
            json!({"id": "u1", "name": "Ann"}),
            json!({"id": "u2", "name": "Bo"}),
        ];
        assert_eq!(values(&store.get()), expected);
        assert_eq!(values(seen.lock().unwrap().last().unwrap()), expected);
        assert!(store.state().get().is_synced());
    }

    #[test]
    fn each_snapshot_replaces_the_list() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        assert!(store.get().is_empty());
        assert_eq!(store.state().get(), SyncState::Pending);

        service.push(vec![doc("a", json!({"n": 1})), doc("b", json!({"n": 2}))]);
        assert_eq!(
            values(&store.get()),
            vec![json!({"id": "a", "n": 1}), json!({"id": "b", "n": 2})]
        );

        // Snapshot order is kept even when it is not id order.
        service.push(vec![doc("c", json!({"n": 3})), doc("a", json!({"n": 9}))]);
        assert_eq!(
            values(&store.get()),
            vec![json!({"id": "c", "n": 3}), json!({"id": "a", "n": 9})]
        );
    }

    #[test]
    fn empty_snapshot_empties_the_list() {
        let (client, service) = in_memory();
        service.insert(&users(), DocumentId::new("u1").unwrap(), Fields::new());
        let store = CollectionStore::new(&client, "users").unwrap();
        assert_eq!(store.get().len(), 1);

        service.remove(&users(), &DocumentId::new("u1").unwrap());
        assert!(store.get().is_empty());
        assert!(matches!(
            store.state().get(),
            SyncState::Synced { documents: 0, .. }
        ));
    }

    #[test]
    fn identifier_wins_over_id_field() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        service.push(vec![doc("real", json!({"id": "fake", "x": 1}))]);
        assert_eq!(values(&store.get()), vec![json!({"id": "real", "x": 1})]);
    }

    #[test]
    fn batched_emission_notifies_once_per_snapshot() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let (seen, _unsub) = recorder(&store);

        service.push(vec![doc("a", json!({})), doc("b", json!({})), doc("c", json!({}))]);

        let seen = seen.lock().unwrap();
        // Initial empty list on subscribe, then one emission.
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].len(), 3);
    }

    #[test]
    fn incremental_emission_publishes_each_step() {
        let (client, service) = scripted();
        let options = StoreOptions {
            emission: Emission::Incremental,
        };
        let store = CollectionStore::with_options(&client, "users", |q| q, options).unwrap();
        let (seen, _unsub) = recorder(&store);

        service.push(vec![doc("a", json!({})), doc("b", json!({})), doc("c", json!({}))]);

        let lengths: Vec<usize> = seen.lock().unwrap().iter().map(Vec::len).collect();
        // Subscribe, then empty, then one per document.
        assert_eq!(lengths, vec![0, 0, 1, 2, 3]);
        assert_eq!(
            store.get().iter().filter_map(Record::id).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn subscribers_see_snapshots_in_arrival_order() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let (seen, _unsub) = recorder(&store);

        service.push(vec![doc("a", json!({}))]);
        service.push(vec![doc("b", json!({}))]);
        service.push(vec![]);

        let firsts: Vec<Option<String>> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|l| l.first().and_then(Record::id).map(str::to_string))
            .collect();
        assert_eq!(
            firsts,
            vec![None, Some("a".into()), Some("b".into()), None]
        );
    }

    #[test]
    fn list_matches_stored_documents_after_concurrent_writes() {
        use std::thread;

        for _ in 0..50 {
            let (client, service) = in_memory();
            let store = CollectionStore::new(&client, "users").unwrap();

            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let service = service.clone();
                    thread::spawn(move || {
                        for n in 0..50 {
                            service.insert(
                                &users(),
                                DocumentId::new(format!("t{t}")).unwrap(),
                                fields(json!({"n": n})),
                            );
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            let truth: Vec<Record> = service
                .documents(&users())
                .into_iter()
                .map(Document::into_record)
                .collect();
            assert_eq!(store.get(), truth);
            assert!(matches!(
                store.state().get(),
                SyncState::Synced { documents: 4, .. }
            ));
        }
    }

    // -----------------------------------------------------------------------
    // Shaping
    // -----------------------------------------------------------------------

    #[test]
    fn shaping_runs_once_and_is_used_for_the_subscription() {
        let (client, service) = scripted();
        let calls = AtomicUsize::new(0);
        let store = CollectionStore::with_query(&client, "users", |q| {
            calls.fetch_add(1, Ordering::SeqCst);
            q.order_by("age", Direction::Descending).limit(10)
        })
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let listeners = service.listeners.lock().unwrap();
        assert_eq!(listeners.len(), 1);
        let expected = Query::new(users())
            .order_by("age", Direction::Descending)
            .limit(10);
        assert_eq!(listeners[0].0, expected);
        assert_eq!(store.query(), &expected);
    }

    #[test]
    fn shaped_query_filters_the_mirror() {
        let (client, service) = in_memory();
        for (id, age) in [("u1", 30), ("u2", 17), ("u3", 52)] {
            service.insert(&users(), DocumentId::new(id).unwrap(), fields(json!({"age": age})));
        }
        let store = CollectionStore::with_query(&client, "users", |q| {
            q.filter("age", FilterOp::GreaterThanOrEqual, json!(18))
                .order_by("age", Direction::Descending)
        })
        .unwrap();

        assert_eq!(
            values(&store.get()),
            vec![json!({"id": "u3", "age": 52}), json!({"id": "u1", "age": 30})]
        );
    }

    #[test]
    fn shaping_for_another_collection_fails() {
        let (client, _service) = in_memory();
        let other = Query::new(CollectionName::new("posts").unwrap());
        let err = CollectionStore::with_query(&client, "users", move |_| other).unwrap_err();
        assert!(matches!(err, StoreError::Remote(RemoteError::InvalidArgument(_))));
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn named_send_is_one_upsert_without_local_mutation() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let (seen, _unsub) = recorder(&store);

        let id = store.send(fields(json!({"a": 1})), Some("doc42")).await.unwrap();
        assert_eq!(id.as_str(), "doc42");

        let sets = service.sets.lock().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].0, users());
        assert_eq!(sets[0].1, Some(DocumentId::new("doc42").unwrap()));
        assert_eq!(sets[0].2, fields(json!({"a": 1})));

        assert!(store.get().is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unnamed_send_delegates_id_assignment() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();

        let id = store.send(fields(json!({"a": 1})), None).await.unwrap();

        let sets = service.sets.lock().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].1, None);
        assert!(!id.as_str().is_empty());
    }

    #[tokio::test]
    async fn send_round_trips_through_snapshot() {
        let (client, service) = in_memory();
        let store = CollectionStore::new(&client, "users").unwrap();

        store.send(fields(json!({"name": "Ann"})), Some("u1")).await.unwrap();
        assert_eq!(values(&store.get()), vec![json!({"id": "u1", "name": "Ann"})]);

        // Full overwrite, not merge.
        store.send(fields(json!({"age": 3})), Some("u1")).await.unwrap();
        assert_eq!(values(&store.get()), vec![json!({"id": "u1", "age": 3})]);
        assert_eq!(service.writes().len(), 2);
    }

    #[tokio::test]
    async fn rejected_send_propagates_unchanged() {
        let (client, service) = in_memory();
        service.reject_writes(Some(RemoteError::PermissionDenied("no".into())));
        let store = CollectionStore::new(&client, "users").unwrap();

        let err = store.send(Fields::new(), Some("u1")).await.unwrap_err();
        match err {
            StoreError::Remote(RemoteError::PermissionDenied(msg)) => assert_eq!(msg, "no"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_doc_name_rejected_before_sending() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let err = store.send(Fields::new(), Some("a/b")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidName(_)));
        assert!(service.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_serialized_requires_an_object() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();

        store
            .send_serialized(&User { name: "Ann" }, Some("u1"))
            .await
            .unwrap();
        assert_eq!(service.sets.lock().unwrap()[0].2, fields(json!({"name": "Ann"})));

        let err = store.send_serialized(&42, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[tokio::test]
    async fn collection_handle_supports_other_operations() {
        let (client, _service) = in_memory();
        let store = CollectionStore::new(&client, "users").unwrap();
        store.send(Fields::new(), Some("u1")).await.unwrap();

        assert!(store
            .collection()
            .delete(&DocumentId::new("u1").unwrap())
            .await
            .unwrap());
        assert!(store.get().is_empty());
    }

    // -----------------------------------------------------------------------
    // Local set, errors, lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn set_bypasses_the_service() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let (seen, _unsub) = recorder(&store);

        let local = vec![doc("x", json!({"local": true})).into_record()];
        store.set(local.clone());

        assert_eq!(store.get(), local);
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(service.sets.lock().unwrap().is_empty());

        service.push(vec![]);
        assert!(store.get().is_empty());
    }

    #[test]
    fn subscription_failure_sets_state_and_keeps_list() {
        let (client, service) = in_memory();
        service.insert(&users(), DocumentId::new("u1").unwrap(), Fields::new());
        let store = CollectionStore::new(&client, "users").unwrap();

        service.fail_listeners(&users(), RemoteError::PermissionDenied("revoked".into()));

        assert_eq!(store.get().len(), 1);
        assert_eq!(
            store.state().get(),
            SyncState::Failed(RemoteError::PermissionDenied("revoked".into()))
        );
    }

    #[test]
    fn failure_reaches_state_subscribers() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let _unsub = store.state().subscribe(move |state| {
            if let Some(err) = state.error() {
                sink.lock().unwrap().push(err.clone());
            }
        });

        service.fail(RemoteError::Unavailable("offline".into()));
        assert_eq!(
            *errors.lock().unwrap(),
            vec![RemoteError::Unavailable("offline".into())]
        );
    }

    #[tokio::test]
    async fn dispose_detaches_live_query() {
        let (client, service) = in_memory();
        let store = CollectionStore::new(&client, "users").unwrap();
        assert_eq!(service.listener_count(), 1);

        store.dispose();
        store.dispose();
        assert!(store.is_disposed());
        assert_eq!(service.listener_count(), 0);
        assert_eq!(store.state().get(), SyncState::Disposed);

        store.send(Fields::new(), Some("u1")).await.unwrap();
        assert!(store.get().is_empty());
    }

    #[test]
    fn disposed_store_ignores_late_snapshots() {
        let (client, service) = scripted();
        let store = CollectionStore::new(&client, "users").unwrap();
        store.dispose();
        assert_eq!(service.detached.load(Ordering::SeqCst), 1);

        // The scripted service keeps calling detached listeners.
        service.push(vec![doc("a", json!({}))]);
        assert!(store.get().is_empty());
        assert_eq!(store.state().get(), SyncState::Disposed);
    }

    #[test]
    fn drop_releases_subscription() {
        let (client, service) = in_memory();
        {
            let _store = CollectionStore::new(&client, "users").unwrap();
            assert_eq!(service.listener_count(), 1);
        }
        assert_eq!(service.listener_count(), 0);
    }

    #[test]
    fn invalid_collection_name_rejected() {
        let (client, _service) = in_memory();
        assert!(matches!(
            CollectionStore::new(&client, ""),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn shut_down_client_cannot_open_stores() {
        let (client, _service) = in_memory();
        client.shutdown();
        assert!(matches!(
            CollectionStore::new(&client, "users"),
            Err(StoreError::Remote(RemoteError::Unavailable(_)))
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn snapshot_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
            proptest::collection::vec(("[a-z]{1,6}", any::<i64>()), 0..8)
        }

        proptest! {
            #[test]
            fn list_matches_latest_snapshot(
                snapshots in proptest::collection::vec(snapshot_strategy(), 1..6),
                incremental in any::<bool>(),
            ) {
                let (client, service) = scripted();
                let options = StoreOptions {
                    emission: if incremental { Emission::Incremental } else { Emission::Batched },
                };
                let store = CollectionStore::with_options(&client, "users", |q| q, options).unwrap();

                for entries in &snapshots {
                    let docs: Vec<Document> = entries
                        .iter()
                        .map(|(id, n)| doc(id, json!({"n": n, "id": "shadow"})))
                        .collect();
                    service.push(docs.clone());

                    let expected: Vec<Value> = docs
                        .iter()
                        .map(|d| json!({"id": d.id.as_str(), "n": d.fields["n"]}))
                        .collect();
                    prop_assert_eq!(values(&store.get()), expected);
                }
            }
        }
    }
}
