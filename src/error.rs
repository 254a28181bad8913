//! Error taxonomy for the ingestion pipeline.
//!
//! Validation and reference failures reject a single payload item; store
//! failures indicate the atomic commit (or a lookup) failed, with the
//! transaction already rolled back.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for field `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    ReferenceNotFound { entity: &'static str, id: i64 },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl IngestError {
    /// True for rejections of the payload itself (bad fields or dangling
    /// references), as opposed to store failures.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IngestError::MissingField(_)
                | IngestError::InvalidValue { .. }
                | IngestError::ReferenceNotFound { .. }
        )
    }
}
