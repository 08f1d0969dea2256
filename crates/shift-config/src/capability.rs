//! Capability units
//!
//! A capability unit is any named piece of a bot that can be carried over to
//! an agent: topics, entities, automation flows, channels, skills and custom
//! components. Every unit carries a `migratable` policy flag that is set at
//! ingestion time and never recomputed.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Capability kind discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Conversation topic
    Topic,
    /// Recognized entity
    Entity,
    /// Automation flow
    Flow,
    /// Delivery channel
    Channel,
    /// Skill reference
    Skill,
    /// Custom component reference
    Component,
}

impl CapabilityKind {
    /// All kinds in collection order
    pub const ALL: [CapabilityKind; 6] = [
        CapabilityKind::Topic,
        CapabilityKind::Entity,
        CapabilityKind::Flow,
        CapabilityKind::Channel,
        CapabilityKind::Skill,
        CapabilityKind::Component,
    ];

    /// Stable lowercase label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Topic => "topic",
            CapabilityKind::Entity => "entity",
            CapabilityKind::Flow => "flow",
            CapabilityKind::Channel => "channel",
            CapabilityKind::Skill => "skill",
            CapabilityKind::Component => "component",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sealed trait - only the detail types in this module describe capabilities
mod private {
    pub trait Sealed {}
}

/// Per-kind detail payload of a capability unit
///
/// Sealed: the set of capability kinds is closed.
pub trait CapabilityDetail:
    Clone + fmt::Debug + PartialEq + Send + Sync + 'static + private::Sealed
{
    /// Kind this detail belongs to
    const KIND: CapabilityKind;
}

/// A single capability unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityUnit<D> {
    /// Identifier, unique within its collection
    pub id: String,
    /// Display name
    pub name: String,
    /// Eligible for automatic carry-over
    pub migratable: bool,
    /// Kind-specific detail
    pub detail: D,
}

impl<D: CapabilityDetail> CapabilityUnit<D> {
    /// Create a new unit
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyIdentifier`] if `id` is blank.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        migratable: bool,
        detail: D,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ConfigError::EmptyIdentifier { kind: D::KIND });
        }
        Ok(Self {
            id,
            name: name.into(),
            migratable,
            detail,
        })
    }

    /// Kind of this unit
    #[inline]
    #[must_use]
    pub fn kind(&self) -> CapabilityKind {
        D::KIND
    }

    /// Borrowed view for kind-agnostic consumers
    #[inline]
    #[must_use]
    pub fn view(&self) -> CapabilityRef<'_> {
        CapabilityRef {
            kind: D::KIND,
            id: &self.id,
            name: &self.name,
            migratable: self.migratable,
        }
    }
}

/// Kind-erased borrowed view of a capability unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityRef<'a> {
    pub kind: CapabilityKind,
    pub id: &'a str,
    pub name: &'a str,
    pub migratable: bool,
}

/// Topic subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicKind {
    /// Authored by the bot owner
    #[default]
    Custom,
    /// Shipped with the platform (greeting, escalate, goodbye)
    System,
    /// Catch-all for unrecognized input
    Fallback,
}

/// Topic detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopicDetail {
    pub kind: TopicKind,
    pub trigger_phrases: Vec<String>,
}

/// Entity subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Platform-provided entity (dates, numbers, email)
    Prebuilt,
    /// Closed list of synonyms
    #[default]
    ClosedList,
    /// Pattern based
    Regex,
}

/// Entity detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityDetail {
    pub kind: EntityKind,
    pub values: Vec<String>,
}

/// What starts an automation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowTrigger {
    /// Called from a topic
    #[default]
    Topic,
    /// Runs on a schedule
    Schedule,
    /// Fired by an external event
    Event,
}

/// Automation flow detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowDetail {
    pub trigger: FlowTrigger,
    pub connector: Option<String>,
}

/// Channel detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelDetail {
    /// Platform the channel publishes to (web chat, teams, slack, ...)
    pub platform: String,
}

/// Skill reference detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkillDetail {
    pub endpoint: Option<String>,
}

/// Custom component reference detail
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentDetail {
    pub component_type: String,
}

macro_rules! capability_detail {
    ($($detail:ty => $kind:expr),* $(,)?) => {
        $(
            impl private::Sealed for $detail {}
            impl CapabilityDetail for $detail {
                const KIND: CapabilityKind = $kind;
            }
        )*
    };
}

capability_detail! {
    TopicDetail => CapabilityKind::Topic,
    EntityDetail => CapabilityKind::Entity,
    FlowDetail => CapabilityKind::Flow,
    ChannelDetail => CapabilityKind::Channel,
    SkillDetail => CapabilityKind::Skill,
    ComponentDetail => CapabilityKind::Component,
}

pub type Topic = CapabilityUnit<TopicDetail>;
pub type Entity = CapabilityUnit<EntityDetail>;
pub type AutomationFlow = CapabilityUnit<FlowDetail>;
pub type Channel = CapabilityUnit<ChannelDetail>;
pub type Skill = CapabilityUnit<SkillDetail>;
pub type Component = CapabilityUnit<ComponentDetail>;

/// The six capability collections shared by sources and targets
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityCollections {
    pub topics: Vec<Topic>,
    pub entities: Vec<Entity>,
    pub flows: Vec<AutomationFlow>,
    pub channels: Vec<Channel>,
    pub skills: Vec<Skill>,
    pub components: Vec<Component>,
}

impl CapabilityCollections {
    /// Empty collections
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate every unit as a kind-erased view, in collection order
    pub fn iter(&self) -> impl Iterator<Item = CapabilityRef<'_>> {
        self.topics
            .iter()
            .map(CapabilityUnit::view)
            .chain(self.entities.iter().map(CapabilityUnit::view))
            .chain(self.flows.iter().map(CapabilityUnit::view))
            .chain(self.channels.iter().map(CapabilityUnit::view))
            .chain(self.skills.iter().map(CapabilityUnit::view))
            .chain(self.components.iter().map(CapabilityUnit::view))
    }

    /// Copy of these collections keeping only migratable units
    #[must_use]
    pub fn migratable_only(&self) -> Self {
        fn keep<D: Clone>(units: &[CapabilityUnit<D>]) -> Vec<CapabilityUnit<D>> {
            units.iter().filter(|u| u.migratable).cloned().collect()
        }

        Self {
            topics: keep(&self.topics),
            entities: keep(&self.entities),
            flows: keep(&self.flows),
            channels: keep(&self.channels),
            skills: keep(&self.skills),
            components: keep(&self.components),
        }
    }

    /// Per-collection sizes
    #[must_use]
    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            topics: self.topics.len(),
            entities: self.entities.len(),
            flows: self.flows.len(),
            channels: self.channels.len(),
            skills: self.skills.len(),
            components: self.components.len(),
        }
    }

    /// Total number of units across all collections
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts().total()
    }

    /// True when every collection is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that identifiers are non-empty and unique within each collection
    ///
    /// # Errors
    /// Returns the first offending identifier found, in collection order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen: HashSet<(CapabilityKind, &str)> = HashSet::new();
        for unit in self.iter() {
            if unit.id.trim().is_empty() {
                return Err(ConfigError::EmptyIdentifier { kind: unit.kind });
            }
            if !seen.insert((unit.kind, unit.id)) {
                return Err(ConfigError::DuplicateIdentifier {
                    kind: unit.kind,
                    id: unit.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Per-collection unit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub topics: usize,
    pub entities: usize,
    pub flows: usize,
    pub channels: usize,
    pub skills: usize,
    pub components: usize,
}

impl CollectionCounts {
    /// Count for one kind
    #[must_use]
    pub fn get(&self, kind: CapabilityKind) -> usize {
        match kind {
            CapabilityKind::Topic => self.topics,
            CapabilityKind::Entity => self.entities,
            CapabilityKind::Flow => self.flows,
            CapabilityKind::Channel => self.channels,
            CapabilityKind::Skill => self.skills,
            CapabilityKind::Component => self.components,
        }
    }

    /// Sum over all kinds
    #[must_use]
    pub fn total(&self) -> usize {
        CapabilityKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}

impl fmt::Display for CollectionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} topics, {} entities, {} flows, {} channels, {} skills, {} components",
            self.topics, self.entities, self.flows, self.channels, self.skills, self.components
        )
    }
}
