//! Learning substrate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearnError {
    #[error("learning store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("learning payload corrupt: {0}")]
    Payload(#[from] serde_json::Error),
}
