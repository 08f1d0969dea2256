//! Produced agent snapshot

use crate::capability::CapabilityCollections;
use crate::source::AuthDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a produced agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Being assembled
    #[default]
    Draft,
    /// Under the test battery
    Testing,
    /// Deployed and live
    Published,
    /// Migration stopped on this agent
    Error,
}

impl AgentStatus {
    /// Stable lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Draft => "draft",
            AgentStatus::Testing => "testing",
            AgentStatus::Published => "published",
            AgentStatus::Error => "error",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent produced by a migration flow
///
/// Created empty in `Draft` when a flow is planned and filled in step by step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfiguration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: CapabilityCollections,
    pub auth: AuthDescriptor,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub deployment_url: Option<String>,
    /// Identifier of the source this agent was migrated from
    pub source_id: String,
    /// Capabilities the agent declares with no source analogue
    pub declared_capabilities: Vec<String>,
}

impl TargetConfiguration {
    /// Empty draft agent
    #[must_use]
    pub fn draft(
        id: impl Into<String>,
        name: impl Into<String>,
        source_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            capabilities: CapabilityCollections::new(),
            auth: AuthDescriptor::default(),
            status: AgentStatus::Draft,
            created_at,
            published_at: None,
            deployment_url: None,
            source_id: source_id.into(),
            declared_capabilities: Vec::new(),
        }
    }

    /// With declared capabilities
    #[inline]
    #[must_use]
    pub fn with_declared_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// True once the agent has been deployed
    #[inline]
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == AgentStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_is_empty() {
        let target = TargetConfiguration::draft("agent-1", "Helper", "bot-1", Utc::now());
        assert_eq!(target.status, AgentStatus::Draft);
        assert!(target.capabilities.is_empty());
        assert!(target.deployment_url.is_none());
        assert!(target.published_at.is_none());
        assert!(!target.is_published());
    }

    #[test]
    fn agent_status_labels() {
        assert_eq!(AgentStatus::Published.to_string(), "published");
        assert_eq!(
            serde_json::to_string(&AgentStatus::Testing).unwrap(),
            "\"testing\""
        );
    }
}
