//! Typed errors for the prediction request path
//!
//! Every failure the core can produce is returned as a value with a distinct
//! kind so the embedding transport layer can map status codes without string
//! matching. Startup-time configuration errors use `anyhow` instead and are
//! expected to abort the process.

use thiserror::Error;

/// Failure kinds for a single prediction request
#[derive(Debug, Error)]
pub enum PredictError {
    /// Identifier matched no registered family prefix
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    /// Input bytes were empty or not a decodable image
    #[error("invalid image input: {0}")]
    InvalidImage(String),

    /// Model artifact missing, corrupt, or rejected by the loader
    #[error("failed to load model {model}: {reason}")]
    LoadFailure { model: String, reason: String },

    /// Model output cannot be indexed by the family's label table
    #[error("output index {index} outside label table of length {table_len} for family {family}")]
    ModelMismatch {
        family: String,
        index: usize,
        table_len: usize,
    },

    /// Family declares advisory support but has no record for the label
    #[error("no advisory record for label {label:?} in family {family}")]
    AdvisoryMissing { family: String, label: String },

    /// A loaded model failed while executing
    #[error("inference failed for model {model}: {reason}")]
    Inference { model: String, reason: String },
}

impl PredictError {
    /// True when the failure was caused by the request itself rather than
    /// the service or its deployment
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::UnsupportedModel(_) | PredictError::InvalidImage(_)
        )
    }
}
