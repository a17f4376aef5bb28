use thiserror::Error;

use bazaar_store::StoreError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any store call was made.
    #[error("validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
