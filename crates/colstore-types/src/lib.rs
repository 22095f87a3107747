//! Foundation types for colstore.
//!
//! Every other colstore crate depends on `colstore-types`.
//!
//! # Key Types
//!
//! - [`CollectionName`] / [`DocumentId`]: validated path segments
//! - [`Document`]: identifier plus [`Fields`] as held by the remote service
//! - [`Record`]: a document's fields with its identifier injected as `id`
//! - [`Query`]: filters, orderings, and a limit over one collection
//! - [`QuerySnapshot`]: the ordered result of a query at a point in time

pub mod document;
pub mod error;
pub mod name;
pub mod query;
pub mod snapshot;

pub use document::{Document, Fields, Record, ID_FIELD};
pub use error::TypeError;
pub use name::{CollectionName, DocumentId};
pub use query::{compare_values, Direction, Filter, FilterOp, OrderBy, Query};
pub use snapshot::QuerySnapshot;
