// oxidedb-core/src/error.rs
// Command-layer error types with stable numeric codes for status documents

use thiserror::Error;

/// Errors surfaced by the command admission layer.
///
/// Every failure short-circuits the admission chain; nothing at this
/// layer mutates persistent state, so there is never a compensating
/// action to run.
#[derive(Debug, Error)]
pub enum OxideError {
    /// Command document is structurally invalid
    #[error("Failed to parse: {0}")]
    FailedToParse(String),

    /// A field exists but has the wrong type
    #[error("field '{field}' must be of type {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    /// Target namespace missing or unresolvable from the raw command
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// The principal lacks the capability for this namespace/operation
    #[error("not authorized on {0} to execute command")]
    Unauthorized(String),

    /// A request option is not permitted in the current configuration
    #[error("{0}")]
    InvalidOptions(String),

    /// No command registered under the requested name
    #[error("no such command: '{0}'")]
    CommandNotFound(String),

    /// Failure raised by the execution engine, propagated unchanged
    #[error("aggregation execution failed: {0}")]
    ExecutionFailed(String),

    /// Operation ran past its deadline
    #[error("operation exceeded time limit")]
    ExceededTimeLimit,

    /// Operation was killed by the host
    #[error("operation was interrupted")]
    Interrupted,
}

impl OxideError {
    /// Stable wire code, rendered into `{ok: 0, errmsg, code}` status
    /// documents by [`crate::commands::append_command_status`].
    pub fn code(&self) -> i32 {
        match self {
            OxideError::FailedToParse(_) => 9,
            OxideError::Unauthorized(_) => 13,
            OxideError::TypeMismatch { .. } => 14,
            OxideError::ExceededTimeLimit => 50,
            OxideError::CommandNotFound(_) => 59,
            OxideError::InvalidOptions(_) => 72,
            OxideError::InvalidNamespace(_) => 73,
            OxideError::ExecutionFailed(_) => 96,
            OxideError::Interrupted => 11601,
        }
    }

    /// Symbolic name of the error kind (for logs and CLI output).
    pub fn code_name(&self) -> &'static str {
        match self {
            OxideError::FailedToParse(_) => "FailedToParse",
            OxideError::Unauthorized(_) => "Unauthorized",
            OxideError::TypeMismatch { .. } => "TypeMismatch",
            OxideError::ExceededTimeLimit => "ExceededTimeLimit",
            OxideError::CommandNotFound(_) => "CommandNotFound",
            OxideError::InvalidOptions(_) => "InvalidOptions",
            OxideError::InvalidNamespace(_) => "InvalidNamespace",
            OxideError::ExecutionFailed(_) => "ExecutionFailed",
            OxideError::Interrupted => "Interrupted",
        }
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, OxideError>;
