use colstore_remote::RemoteError;
use colstore_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A collection name or document name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(#[from] TypeError),

    /// The remote service rejected the operation. Passed through unchanged.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
