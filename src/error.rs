use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("cannot delete the last remaining scheme")]
    LastScheme,

    #[error("seat {0} is locked")]
    SeatLocked(String),

    #[error("storage failed: {0}")]
    Storage(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable code reported over IPC.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::LastScheme => "last_scheme",
            StoreError::SeatLocked(_) => "seat_locked",
            StoreError::Storage(_) => "storage_failed",
            StoreError::InvalidPayload(_) => "invalid_payload",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
