//! Service-level error: a domain refusal, a store failure, or an internal fault.

use thiserror::Error;

use classbook_core::DomainError;

use crate::store::StoreError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Hashing or token signing failed. Never caused by caller input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(err) => Some(err),
            ServiceError::Store(_) | ServiceError::Internal(_) => None,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Domain(err) => err.code(),
            ServiceError::Store(StoreError::SerializationConflict(_)) => "serialization_conflict",
            ServiceError::Store(StoreError::UniqueViolation(_)) => "unique_violation",
            ServiceError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            ServiceError::Store(StoreError::Database(_)) => "store_error",
            ServiceError::Internal(_) => "internal_error",
        }
    }
}
