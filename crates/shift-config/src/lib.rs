//! Shift Configuration Model
//!
//! Snapshots exchanged by the migration core:
//!
//! - [`SourceConfiguration`]: the rule-based bot being migrated (read-only)
//! - [`TargetConfiguration`]: the agent produced by a migration flow
//! - [`CapabilityUnit`]: topics, entities, flows, channels, skills and
//!   components, each carrying a `migratable` policy flag
//!
//! # Example
//!
//! ```rust,ignore
//! use shift_config::{SourceConfiguration, Topic, TopicDetail};
//!
//! let source = SourceConfiguration::new("bot-1", "Helpdesk")?
//!     .with_topic(Topic::new("greet", "Greeting", true, TopicDetail::default())?);
//! assert_eq!(source.capabilities.migratable_only().topics.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod capability;
mod error;
mod source;
mod target;

pub use capability::{
    AutomationFlow, CapabilityCollections, CapabilityDetail, CapabilityKind, CapabilityRef,
    CapabilityUnit, Channel, ChannelDetail, CollectionCounts, Component, ComponentDetail,
    Entity, EntityDetail, EntityKind, FlowDetail, FlowTrigger, Skill, SkillDetail, Topic,
    TopicDetail, TopicKind,
};
pub use error::ConfigError;
pub use source::{AuthDescriptor, AuthMode, SourceConfiguration};
pub use target::{AgentStatus, TargetConfiguration};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
