//! Reference store errors.

use thiserror::Error;

/// Errors raised while loading or querying the bundled reference data.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// The bundled JSON failed to parse. Fatal at startup.
    #[error("malformed bundled reference data ({resource}): {source}")]
    Malformed {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The bundled data violates a structural invariant. Fatal at startup.
    #[error("inconsistent reference data: {0}")]
    Inconsistent(String),

    /// Lookup of a domain code that is not bundled.
    #[error("unknown SDTM domain: {0}")]
    UnknownDomain(String),
}
