//! Error types and handling for the unref lifecycle core

/// Result type alias for unref operations
pub type Result<T> = std::result::Result<T, UnrefError>;

/// Error types for reference-count and fragment-cache operations
#[derive(Debug, thiserror::Error)]
pub enum UnrefError {
    /// A reference count was decremented past zero, indicating a
    /// double-release or use-after-free bug in the caller
    #[error("Integrity violation: decrement by {delta} with only {observed} reference(s) held")]
    IntegrityViolation { observed: u32, delta: u32 },

    /// Fragment issuance requested more space than remains in the
    /// backing resource
    #[error("Backing resource exhausted: requested {requested} bytes, {remaining} remaining")]
    Exhausted { requested: usize, remaining: usize },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Operation attempted against a cache in the wrong lifecycle state
    #[error("Invalid state: expected {expected}, cache is {actual}")]
    InvalidState { expected: String, actual: String },
}

impl UnrefError {
    /// Create an integrity violation error
    pub fn integrity(observed: u32, delta: u32) -> Self {
        Self::IntegrityViolation { observed, delta }
    }

    /// Create an exhausted error
    pub fn exhausted(requested: usize, remaining: usize) -> Self {
        Self::Exhausted {
            requested,
            remaining,
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this error indicates caller-side misuse of the ownership
    /// contract (double release or underflow) rather than a recoverable
    /// resource condition
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. })
    }
}
