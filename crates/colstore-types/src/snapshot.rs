use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Document, Record};

/// The complete, ordered result of a query at one point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuerySnapshot {
    pub documents: Vec<Document>,
    pub read_time: DateTime<Utc>,
}

impl QuerySnapshot {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            read_time: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    /// Decode every document into a [`Record`], keeping snapshot order.
    pub fn records(&self) -> Vec<Record> {
        self.documents.iter().map(Document::to_record).collect()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
