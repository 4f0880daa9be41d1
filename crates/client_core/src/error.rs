use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failure reported by an entity store, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store rejected request ({code:?}): {message}")]
pub struct StoreError {
    pub code: ErrorCode,
    pub message: String,
}

impl StoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_not_found_or_forbidden(&self) -> bool {
        self.code.is_not_found_or_forbidden()
    }
}

impl From<ApiError> for StoreError {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MutationError {
    #[error("invalid mutation: {0}")]
    Validation(String),
    #[error("not found or not owned: {0}")]
    NotFoundOrForbidden(String),
    #[error("invalid drag payload: {0}")]
    TransferPayloadInvalid(String),
    #[error("no signed-in account")]
    Unauthenticated,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MutationError {
    fn from(value: StoreError) -> Self {
        match value.code {
            ErrorCode::NotFound | ErrorCode::Forbidden => Self::NotFoundOrForbidden(value.message),
            ErrorCode::Unauthorized => Self::Unauthenticated,
            ErrorCode::Validation => Self::Validation(value.message),
            ErrorCode::Internal => Self::Store(value),
        }
    }
}
