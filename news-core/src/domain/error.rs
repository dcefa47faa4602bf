use thiserror::Error;

/// Failures raised by a backing store: the document store, key-value storage
/// or the auth provider.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    #[error("permission denied")]
    PermissionDenied,
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("article not found: {0}")]
    ArticleNotFound(String),
    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),
}

impl NewsError {
    /// Only persistence failures are reported to the user as a notice.
    pub fn is_persistence(&self) -> bool {
        matches!(self, NewsError::Persistence(_))
    }
}

impl From<StoreError> for NewsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => NewsError::ArticleNotFound(id),
            other => NewsError::Persistence(other),
        }
    }
}
