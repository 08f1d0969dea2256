//! Error types for configuration construction and validation

use crate::capability::CapabilityKind;

/// Configuration model errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Capability identifier was blank
    #[error("{kind} has an empty identifier")]
    EmptyIdentifier { kind: CapabilityKind },

    /// Capability identifier appears twice in one collection
    #[error("duplicate {kind} identifier: {id}")]
    DuplicateIdentifier { kind: CapabilityKind, id: String },

    /// Configuration identifier was blank
    #[error("configuration identifier is empty")]
    EmptyConfigurationId,
}
