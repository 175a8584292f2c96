//! Commerce engine error types.

use thiserror::Error;

use toyshop_core::{
    AddressError, PaymentError, PriceError, QuantityError, QueryError, RatingError,
    TransitionError,
};

use crate::db::RepositoryError;
use crate::models::ProductError;

/// Errors returned by every engine operation.
///
/// Inputs are validated first, then existence, then authorization; only after
/// all three pass is anything written.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed, missing or out-of-range request data.
    #[error("{0}")]
    InvalidInput(String),

    /// The caller is neither the owner nor an administrator.
    #[error("{0}")]
    Unauthorized(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation or lost optimistic-concurrency race.
    #[error("{0}")]
    Conflict(String),

    /// Storage failure.
    #[error("storage error: {0}")]
    Internal(RepositoryError),
}

impl CommerceError {
    pub(crate) fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub(crate) fn admin_only() -> Self {
        Self::Unauthorized("Not authorized as an admin".to_owned())
    }
}

impl From<RepositoryError> for CommerceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            other => Self::Internal(other),
        }
    }
}

macro_rules! invalid_input_from {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for CommerceError {
                fn from(err: $error) -> Self {
                    Self::InvalidInput(err.to_string())
                }
            }
        )+
    };
}

invalid_input_from!(
    AddressError,
    PaymentError,
    PriceError,
    ProductError,
    QuantityError,
    QueryError,
    RatingError,
    TransitionError,
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_conflict_stays_conflict() {
        let err: CommerceError = RepositoryError::Conflict("duplicate".to_string()).into();
        assert!(matches!(err, CommerceError::Conflict(ref m) if m == "duplicate"));
    }

    #[test]
    fn test_repository_failure_is_internal() {
        let err: CommerceError = RepositoryError::DataCorruption("bad row".to_string()).into();
        assert!(matches!(err, CommerceError::Internal(_)));
    }

    #[test]
    fn test_domain_errors_are_invalid_input() {
        let err: CommerceError = QuantityError::NotPositive(0).into();
        assert!(matches!(err, CommerceError::InvalidInput(_)));
    }
}
