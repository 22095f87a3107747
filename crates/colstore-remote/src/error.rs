use colstore_types::TypeError;
use thiserror::Error;

/// Errors reported by a remote document service.
///
/// `Clone` so one failure can be delivered to every affected listener.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The service or client cannot be reached, or has been shut down.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
