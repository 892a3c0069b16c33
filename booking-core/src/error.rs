use thiserror::Error;

/// Storage-layer failures. `Conflict` and `Stale` carry the outcome of
/// guarded writes so the workflow can translate a lost race into the right
/// caller-facing error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// A booking insert collided with an overlapping booking.
    #[error("booking overlaps an existing booking")]
    Conflict,

    /// A guarded update matched zero rows: the row moved to another state
    /// between read and write.
    #[error("row changed state concurrently")]
    Stale,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::NotFound => StoreError::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => StoreError::Conflict,
            // The bookings exclusion constraint surfaces as a generic
            // database error; recognize it by name.
            Error::DatabaseError(_, ref info)
                if info.constraint_name() == Some("bookings_no_overlap") =>
            {
                StoreError::Conflict
            }
            other => StoreError::Backend(anyhow::Error::new(other)),
        }
    }
}

/// Caller-facing failures of the core operations. Every variant has a
/// stable kind so the surrounding web layer can map it without parsing
/// messages.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation { .. } => "validation",
            WorkflowError::InvalidState(_) => "invalid_state",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Store(_) => "storage",
        }
    }
}
