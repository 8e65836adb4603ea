//! Domain error types.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur when decoding or transforming documents.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A document is missing a required field or has the wrong shape.
    ///
    /// Field presence is the only validation performed; the offending
    /// document is reported and skipped, not retried.
    #[error("malformed {record_type} document: {source}")]
    Malformed {
        record_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Decodes a JSON document into a typed record.
///
/// A failure is classified as [`DomainError::Malformed`] and tagged with
/// the record type for error reporting.
pub fn decode<T: DeserializeOwned>(
    record_type: &'static str,
    value: &serde_json::Value,
) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|source| DomainError::Malformed {
        record_type,
        source,
    })
}
