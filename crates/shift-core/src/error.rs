//! Error types for Shift Core
//!
//! Covers:
//! - Step action failures (fatal to a flow)
//! - Usage errors (running a flow twice, malformed inputs)
//! - Best-effort collaborator failures (never fatal)
//! - Persistence and configuration errors

use crate::types::StepKind;
use shift_delta::DeltaError;

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A step action rejected; the flow stopped at this step
    #[error("step {step} failed: {message}")]
    StepActionFailure { step: StepKind, message: String },

    /// Caller misused a flow or passed malformed input
    #[error("invalid flow state: {0}")]
    InvalidFlowState(String),

    /// Optional collaborator could not be reached
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(#[from] CollaboratorError),

    /// Persistence collaborator failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Invalid orchestrator configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Delta engine rejected its inputs
    #[error("delta error: {0}")]
    Delta(#[from] DeltaError),
}

impl MigrationError {
    /// Check if error is a programmer/usage error
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidFlowState(_) | Self::Delta(_) | Self::Config(_)
        )
    }

    /// Check if error came from an optional collaborator and may be
    /// replaced by a fallback value
    #[inline]
    #[must_use]
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::CollaboratorUnavailable(_))
    }

    /// Check if error came from a step action
    #[inline]
    #[must_use]
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::StepActionFailure { .. })
    }

    /// Step that failed, if any
    #[must_use]
    pub fn failed_step(&self) -> Option<StepKind> {
        match self {
            Self::StepActionFailure { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Error returned by a step action
///
/// The message is recorded verbatim on the failing step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct StepFailure {
    pub message: String,
}

impl StepFailure {
    /// Create new failure
    #[inline]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<DeltaError> for StepFailure {
    fn from(err: DeltaError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<shift_config::ConfigError> for StepFailure {
    fn from(err: shift_config::ConfigError) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors from the text-generation collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// No generator configured
    #[error("no text generator configured")]
    NotConfigured,

    /// Provider could not be reached
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// Provider answered with nothing usable
    #[error("empty response from provider")]
    EmptyResponse,
}

/// Errors from the persistence collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Backend rejected the operation
    #[error("store backend error: {0}")]
    Backend(String),

    /// Record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;
