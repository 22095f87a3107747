//! Remote document service boundary for colstore.
//!
//! The [`DocumentService`] trait is what a backend must provide: full-document
//! upserts, deletes, one-shot queries, and live queries that push a complete
//! [`QuerySnapshot`](colstore_types::QuerySnapshot) whenever the result
//! changes. [`DocumentClient`] is the explicitly constructed entry point that
//! hands out [`CollectionRef`] handles.
//!
//! # Backends
//!
//! - [`InMemoryDocumentService`]: map-backed service for tests, demos, and
//!   embedding

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod service;

pub use client::{CollectionRef, DocumentClient};
pub use config::ClientConfig;
pub use error::{RemoteError, RemoteResult};
pub use memory::{InMemoryDocumentService, WriteRecord};
pub use service::{DocumentService, ListenerRegistration, SnapshotListener};
