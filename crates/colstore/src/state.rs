use chrono::{DateTime, Utc};
use colstore_remote::RemoteError;

/// Health of a store's live subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncState {
    /// No snapshot received yet.
    Pending,
    /// The list reflects the snapshot read at `read_time`.
    Synced {
        documents: usize,
        read_time: DateTime<Utc>,
    },
    /// The service ended the subscription. The list keeps its last value.
    Failed(RemoteError),
    /// The store was disposed; no further snapshots are applied.
    Disposed,
}

impl SyncState {
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
