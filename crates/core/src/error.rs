//! Error types shared by the core domain.
//!
//! Every fallible operation in the practice flow has a local fallback path, so
//! these errors are mostly converted into user-facing notices by the caller
//! rather than propagated further.

use crate::wizard::Step;

/// Errors raised by the backend port (network, HTTP status, decoding).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or the request timed out.
    #[error("Network error: {0}")]
    Network(String),
    /// An identical request is already outstanding.
    #[error("Duplicate request rejected: {0}")]
    DuplicateRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The monthly generation quota is exhausted.
    #[error("Usage limit reached: {0}")]
    QuotaExceeded(String),
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Connectivity failures are shown as a non-blocking warning.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, BackendError::Network(_))
    }
}

/// A convenience alias for backend port results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Inline validation failures, reported next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    /// The name of the field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Required { field } | ValidationError::Invalid { field, .. } => field,
        }
    }
}

/// Rejected wizard transitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: Step, to: Step },
    #[error("Cannot advance past the final step ({0})")]
    AtLastStep(Step),
    #[error("Cannot go back from the first step ({0})")]
    AtFirstStep(Step),
    #[error("Retake is only available from the feedback step, not {0}")]
    RetakeNotAllowed(Step),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised by the authentication provider port.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    AccountExists,
    #[error("Not signed in")]
    NotSignedIn,
    #[error("Authentication provider error: {0}")]
    Provider(String),
}

/// Errors raised while persisting the question cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
