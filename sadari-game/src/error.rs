//! Errors reported by the arcade services.
use std::time::Duration;
use thiserror::Error;

use crate::config::ValidationError;
use crate::numbers::millis_to_secs_ceil;
use crate::store::StoreError;

/// Every failure a caller of the services can observe. None are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidPayload(#[from] ValidationError),
    #[error("no saved ladder with that id")]
    NotFound,
    #[error("too many requests; retry in {}s", whole_secs(.retry_after))]
    RateLimited { retry_after: Duration },
    #[error("this run was already submitted")]
    DuplicateSubmission,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("unauthorized")]
    Unauthorized,
}

fn whole_secs(retry_after: &Duration) -> u64 {
    millis_to_secs_ceil(i64::try_from(retry_after.as_millis()).unwrap_or(i64::MAX))
}

impl ServiceError {
    /// Stable wire code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "invalid_payload",
            Self::NotFound => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::DuplicateSubmission => "duplicate_submission",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Unauthorized => "unauthorized",
        }
    }

    /// Whole seconds a rate-limited caller should wait.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(whole_secs(retry_after)),
            _ => None,
        }
    }

    pub(crate) fn invalid(field: &str, problem: &str) -> Self {
        Self::InvalidPayload(ValidationError::single(field, problem))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}
