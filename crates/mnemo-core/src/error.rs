//! Engine error types.
//!
//! Sparse data is never an error: analyzers report it through
//! [`DataStatus`](crate::model::DataStatus). Invalid card state is repaired
//! and logged by the scheduler. What remains are failures the caller must see.

use thiserror::Error;

/// Errors surfaced by [`AnalyticsEngine`](crate::engine::AnalyticsEngine)
/// and [`CardScheduler`](crate::scheduler::CardScheduler).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The event log or card-state store returned an error.
    #[error("accessor failure during {operation}: {source:#}")]
    AccessorFailure {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// An accessor call did not complete within the configured deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The engine configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A request argument is outside the supported range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    /// Returns `true` for failures that originate in an accessor, timeouts included.
    pub fn is_accessor_failure(&self) -> bool {
        matches!(
            self,
            EngineError::AccessorFailure { .. } | EngineError::Timeout { .. }
        )
    }

    /// Name of the accessor operation that failed, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            EngineError::AccessorFailure { operation, .. }
            | EngineError::Timeout { operation, .. } => Some(*operation),
            EngineError::InvalidConfig(_) | EngineError::InvalidInput(_) => None,
        }
    }
}
