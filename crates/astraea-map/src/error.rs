//! Mapping engine errors.

use thiserror::Error;

/// Errors from transport or proposal handling.
///
/// Enrichment gaps (unknown variables, CT misses, absent source columns)
/// are never errors; they attach to the affected mapping as notes and
/// confidence adjustments.
#[derive(Debug, Error)]
pub enum MappingEngineError {
    /// The LLM transport failed. The caller decides whether to retry.
    #[error("mapping transport failed: {0}")]
    Transport(String),

    /// The requested domain is not in the bundled reference data.
    #[error(transparent)]
    UnknownDomain(#[from] astraea_reference::ReferenceError),
}

/// Transport-level failure detail.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("API error ({kind}): {message}")]
    Api { kind: String, message: String },

    #[error("response did not satisfy the proposal schema: {0}")]
    Schema(String),

    #[error("missing API key: set ANTHROPIC_API_KEY")]
    MissingApiKey,
}
