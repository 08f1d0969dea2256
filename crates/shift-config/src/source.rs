//! Source bot snapshot
//!
//! A [`SourceConfiguration`] is captured once at ingestion time and is
//! read-only afterwards; flows hold it behind an `Arc`.

use crate::capability::{
    AutomationFlow, CapabilityCollections, Channel, Component, Entity, Skill, Topic,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How end users authenticate against the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No authentication
    #[default]
    None,
    /// Platform identity (single sign-on)
    Integrated,
    /// Manually configured OAuth provider
    Manual,
}

impl AuthMode {
    /// Stable lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Integrated => "integrated",
            AuthMode::Manual => "manual",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization descriptor carried verbatim from source to target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthDescriptor {
    pub mode: AuthMode,
    pub provider: Option<String>,
    pub scopes: Vec<String>,
}

impl AuthDescriptor {
    /// Descriptor with the given mode and no provider
    #[inline]
    #[must_use]
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            provider: None,
            scopes: Vec::new(),
        }
    }

    /// With OAuth provider name
    #[inline]
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// With requested scopes
    #[inline]
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// Immutable snapshot of the bot being migrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfiguration {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: CapabilityCollections,
    pub auth: AuthDescriptor,
}

impl SourceConfiguration {
    /// Create an empty source
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyConfigurationId`] if `id` is blank.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::EmptyConfigurationId);
        }
        Ok(Self {
            id,
            name: name.into(),
            description: String::new(),
            capabilities: CapabilityCollections::new(),
            auth: AuthDescriptor::default(),
        })
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With authorization descriptor
    #[inline]
    #[must_use]
    pub fn with_auth(mut self, auth: AuthDescriptor) -> Self {
        self.auth = auth;
        self
    }

    /// With topic
    #[inline]
    #[must_use]
    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.capabilities.topics.push(topic);
        self
    }

    /// With entity
    #[inline]
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.capabilities.entities.push(entity);
        self
    }

    /// With automation flow
    #[inline]
    #[must_use]
    pub fn with_flow(mut self, flow: AutomationFlow) -> Self {
        self.capabilities.flows.push(flow);
        self
    }

    /// With channel
    #[inline]
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.capabilities.channels.push(channel);
        self
    }

    /// With skill reference
    #[inline]
    #[must_use]
    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.capabilities.skills.push(skill);
        self
    }

    /// With custom component reference
    #[inline]
    #[must_use]
    pub fn with_component(mut self, component: Component) -> Self {
        self.capabilities.components.push(component);
        self
    }

    /// Validate identifiers across all collections
    ///
    /// # Errors
    /// See [`CapabilityCollections::validate`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capabilities.validate()
    }
}
