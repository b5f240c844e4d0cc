//! Errors at the JSON boundary.
//!
//! The pipeline itself cannot fail: malformed fields only drop out of the
//! computation. What can fail is decoding what the page hands us and encoding
//! what we hand back.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
    /// Record snapshot did not decode
    #[error("records are not valid: {0}")]
    Records(#[source] serde_json::Error),

    /// Active tag list did not decode
    #[error("filter tags are not valid: {0}")]
    Tags(#[source] serde_json::Error),

    /// Catalogue configuration did not decode
    #[error("configuration is not valid: {0}")]
    Config(#[source] serde_json::Error),

    /// Cluster id was not a non-negative integer
    #[error("invalid cluster id {0}")]
    ClusterId(f64),

    /// Result could not be encoded
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}
