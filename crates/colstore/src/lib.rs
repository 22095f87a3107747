//! Mirror a live remote document collection into an observable list.
//!
//! A [`CollectionStore`] opens a live query on a named collection, optionally
//! shaped by a caller-supplied function, and keeps a
//! [`Writable`](colstore_reactive::Writable) list of [`Record`]s equal to the
//! latest snapshot the service pushed. Writes go straight through to the
//! service with [`CollectionStore::send`]; the list only changes when the
//! resulting snapshot arrives.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use colstore::{ClientConfig, CollectionStore, DocumentClient, Direction, InMemoryDocumentService};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DocumentClient::new(ClientConfig::new("demo"), Arc::new(InMemoryDocumentService::new()))?;
//! let store = CollectionStore::with_query(&client, "users", |q| q.order_by("name", Direction::Ascending))?;
//! let _unsubscribe = store.subscribe(|users| println!("{} users", users.len()));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod state;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use state::SyncState;
pub use store::{apply_snapshot, CollectionStore, Emission, StoreOptions};

// Re-export the types callers need to build and use a store.
pub use colstore_reactive::{Readable, Unsubscriber, Writable};
pub use colstore_remote::{
    ClientConfig, CollectionRef, DocumentClient, DocumentService, InMemoryDocumentService,
    RemoteError,
};
pub use colstore_types::{
    CollectionName, Direction, Document, DocumentId, Fields, FilterOp, Query, QuerySnapshot,
    Record, ID_FIELD,
};
