//! Error types produced by the item store and the simulators.
//!
//! Every variant is local, synchronous and non-fatal: a failing operation
//! leaves the store exactly as it found it.
//!
//! # HTTP Status Code Mapping
//!
//! ```rust
//! use itemlab::StoreError;
//!
//! fn to_http_status(error: &StoreError) -> u16 {
//!     match error {
//!         StoreError::NotFound(_) => 404,
//!         StoreError::AlreadyInProgress { .. } => 409,
//!         _ => 400,
//!     }
//! }
//! ```
use thiserror::Error;

/// Convenience alias used across the crate.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`ItemStore`](crate::ItemStore) and
/// [`BlockSimulator`](crate::BlockSimulator) operations.
///
/// ```rust
/// use itemlab::StoreError;
///
/// let err = StoreError::NotFound("abc".to_string());
/// assert_eq!(err.to_string(), "item with id abc not found");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum StoreError {
    /// Caller payload failed field validation. No state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No item with the given identifier.
    #[error("item with id {0} not found")]
    NotFound(String),

    /// A block is already holding the store lock; poll the status and retry.
    #[error("a blocking simulation is already in progress ({remaining_secs:.1}s remaining)")]
    AlreadyInProgress { remaining_secs: f64 },

    /// Malformed simulation parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StoreError {
    /// Stable machine-readable code, used by the HTTP layer and in metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "VALIDATION_ERROR",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::AlreadyInProgress { .. } => "ALREADY_IN_PROGRESS",
            StoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }
}
