use thiserror::Error;

use stockline_core::DomainError;

use crate::store::StoreError;

/// Error returned by the application services.
///
/// Everything except `Persistence` is an expected business outcome: reported to
/// the caller as-is, never retried, and never accompanied by a partial ledger
/// change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure; the unit of work was rolled back.
    #[error("persistence failure: {0}")]
    Persistence(#[source] StoreError),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used as the `error` field of API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::InvalidId(_) => "invalid_id",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::AlreadyProcessed(_) => "already_processed",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Persistence(_) => "persistence_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::InvalidId(msg),
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::AlreadyProcessed(msg) => ServiceError::AlreadyProcessed(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => ServiceError::InsufficientStock {
                available,
                requested,
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Persistence(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_stay_conflicts_and_backend_failures_become_persistence() {
        assert_eq!(
            ServiceError::from(StoreError::Conflict("stale".into())),
            ServiceError::Conflict("stale".into())
        );
        let err = ServiceError::from(StoreError::Backend("down".into()));
        assert_eq!(err.code(), "persistence_error");
    }

    #[test]
    fn domain_stock_error_keeps_numbers() {
        let err = ServiceError::from(DomainError::insufficient_stock(3, 5));
        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                available: 3,
                requested: 5
            }
        );
        assert_eq!(err.to_string(), "insufficient stock: requested 5, available 3");
    }
}
