//! Error types for sqlect.

use thiserror::Error;

/// The main error type for sqlect operations.
#[derive(Debug, Error)]
pub enum SqlectError {
    /// A required property is missing or blank.
    #[error("property '{field}' is required but missing or blank")]
    PropMissing { field: String },

    /// A property declared numeric failed to parse as an integer.
    #[error("property '{field}' is not a number")]
    PropNotNumber { field: String },

    /// A property value violates one of its declared facets.
    #[error("property '{field}' is invalid: {reason}")]
    PropInvalid { field: String, reason: String },

    /// Driver-level failure (connection or execution).
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Row-to-struct decoding failure.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SqlectError {
    /// Create a missing-property error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::PropMissing {
            field: field.into(),
        }
    }

    /// Create a not-a-number error.
    pub fn not_number(field: impl Into<String>) -> Self {
        Self::PropNotNumber {
            field: field.into(),
        }
    }

    /// Create an invalid-property error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PropInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Stable numeric code for API layers that report validation outcomes.
    pub fn code(&self) -> u32 {
        match self {
            Self::PropMissing { .. } => 4100,
            Self::PropNotNumber { .. } => 4110,
            Self::PropInvalid { .. } => 4120,
            _ => 1,
        }
    }

    /// True when the error only says "no matching rows".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Driver(DriverError::NotFound))
    }
}

/// Errors surfaced by a [`crate::driver::Driver`] implementation.
///
/// `NotFound` is distinguished so callers can collapse it into an empty
/// result instead of a failure.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Failed to establish or configure a connection.
    #[error("connection error: {0}")]
    Connect(String),

    /// Statement submission failed.
    #[error("execution error: {0}")]
    Execute(String),

    /// The statement ran but matched no rows.
    #[error("no matching rows")]
    NotFound,
}

impl DriverError {
    /// True for the "no matching rows" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Result type alias for sqlect operations.
pub type SqlectResult<T> = Result<T, SqlectError>;
