//! Review errors.

use thiserror::Error;

/// Errors from the review gate and its store.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The reviewer quit. The session is persisted up to the last decision;
    /// resume with the carried session id.
    #[error("review interrupted (session {session_id})")]
    Interrupted { session_id: String },

    /// No session matched the resume request.
    #[error("review session not found: {0}")]
    SessionNotFound(String),

    #[error("review store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("review payload corrupt: {0}")]
    Payload(#[from] serde_json::Error),
}
