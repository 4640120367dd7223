use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("keyring access failed: {0}")]
    Keyring(String),
    #[error("preference file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
