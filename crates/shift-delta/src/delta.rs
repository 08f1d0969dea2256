//! Capability deltas between a source bot and a migrated agent
//!
//! Provides [`CapabilityDelta`], the set-difference of capabilities keyed by
//! [`CapabilityKey`], and [`CapabilityDeltaEngine`] which computes it.
//!
//! # Invariants
//! - `added ∪ retained` is exactly the target's key set
//! - `removed ∪ retained` is exactly the source's key set
//! - `added`, `retained` and `removed` are pairwise disjoint

use serde::{Deserialize, Serialize};
use shift_config::{
    CapabilityCollections, CapabilityKind, ConfigError, SourceConfiguration, TargetConfiguration,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identity of a capability for comparison purposes
///
/// Capabilities compare by identifier within their kind: a topic and an
/// entity sharing an identifier are different capabilities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityKey {
    pub kind: CapabilityKind,
    pub id: String,
}

impl CapabilityKey {
    /// Create new key
    #[inline]
    #[must_use]
    pub fn new(kind: CapabilityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Which side of the comparison was malformed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The source bot
    Source,
    /// The migrated agent
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// Errors from delta computation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// Input collections violate identifier rules
    #[error("malformed {side} configuration: {error}")]
    MalformedConfiguration {
        side: Side,
        #[source]
        error: ConfigError,
    },
}

/// Result of comparing a source against a target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityDelta {
    /// Present in target, absent from source
    pub added: BTreeSet<CapabilityKey>,
    /// Present in both
    pub retained: BTreeSet<CapabilityKey>,
    /// Present in source, absent from target
    pub removed: BTreeSet<CapabilityKey>,
    /// Capabilities the target asserts with no source counterpart
    ///
    /// Passed through verbatim; never deduplicated against `added`.
    pub new_capabilities: Vec<String>,
}

impl CapabilityDelta {
    /// True when nothing was added, removed, or declared
    #[inline]
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.new_capabilities.is_empty()
    }

    /// Added keys of one kind
    pub fn added_of(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityKey> {
        self.added.iter().filter(move |k| k.kind == kind)
    }

    /// Removed keys of one kind
    pub fn removed_of(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityKey> {
        self.removed.iter().filter(move |k| k.kind == kind)
    }

    /// Per-kind added/retained/removed counts
    #[must_use]
    pub fn summary(&self) -> BTreeMap<CapabilityKind, KindSummary> {
        let mut summary: BTreeMap<CapabilityKind, KindSummary> = BTreeMap::new();
        for key in &self.added {
            summary.entry(key.kind).or_default().added += 1;
        }
        for key in &self.retained {
            summary.entry(key.kind).or_default().retained += 1;
        }
        for key in &self.removed {
            summary.entry(key.kind).or_default().removed += 1;
        }
        summary
    }
}

impl fmt::Display for CapabilityDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} ={} -{} (declared {})",
            self.added.len(),
            self.retained.len(),
            self.removed.len(),
            self.new_capabilities.len()
        )
    }
}

/// Counts for one capability kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KindSummary {
    pub added: usize,
    pub retained: usize,
    pub removed: usize,
}

/// Computes [`CapabilityDelta`]s
///
/// Pure: no I/O, no randomness, so repeated calls on unchanged inputs
/// return equal results.
#[derive(Debug, Clone)]
pub struct CapabilityDeltaEngine {
    kinds: BTreeSet<CapabilityKind>,
}

impl CapabilityDeltaEngine {
    /// Engine comparing every capability kind
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            kinds: CapabilityKind::ALL.into_iter().collect(),
        }
    }

    /// Restrict comparison to the given kinds
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = CapabilityKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Kinds this engine compares
    #[inline]
    #[must_use]
    pub fn kinds(&self) -> &BTreeSet<CapabilityKind> {
        &self.kinds
    }

    /// Compare a source bot against the agent migrated from it
    ///
    /// The target's `declared_capabilities` are passed through to
    /// [`CapabilityDelta::new_capabilities`].
    ///
    /// # Errors
    /// Returns [`DeltaError::MalformedConfiguration`] if either side has a
    /// blank or duplicated identifier within one collection.
    pub fn diff(
        &self,
        source: &SourceConfiguration,
        target: &TargetConfiguration,
    ) -> Result<CapabilityDelta, DeltaError> {
        self.diff_collections(
            &source.capabilities,
            &target.capabilities,
            &target.declared_capabilities,
        )
    }

    /// Compare raw capability collections
    ///
    /// # Errors
    /// See [`CapabilityDeltaEngine::diff`].
    pub fn diff_collections(
        &self,
        source: &CapabilityCollections,
        target: &CapabilityCollections,
        declared: &[String],
    ) -> Result<CapabilityDelta, DeltaError> {
        source
            .validate()
            .map_err(|error| DeltaError::MalformedConfiguration {
                side: Side::Source,
                error,
            })?;
        target
            .validate()
            .map_err(|error| DeltaError::MalformedConfiguration {
                side: Side::Target,
                error,
            })?;

        let source_keys = self.keys(source);
        let target_keys = self.keys(target);

        let delta = CapabilityDelta {
            added: target_keys.difference(&source_keys).cloned().collect(),
            retained: target_keys.intersection(&source_keys).cloned().collect(),
            removed: source_keys.difference(&target_keys).cloned().collect(),
            new_capabilities: declared.to_vec(),
        };

        tracing::debug!(%delta, "computed capability delta");
        Ok(delta)
    }

    fn keys(&self, collections: &CapabilityCollections) -> BTreeSet<CapabilityKey> {
        collections
            .iter()
            .filter(|unit| self.kinds.contains(&unit.kind))
            .map(|unit| CapabilityKey::new(unit.kind, unit.id))
            .collect()
    }
}

impl Default for CapabilityDeltaEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Compare with a default engine
///
/// # Errors
/// See [`CapabilityDeltaEngine::diff`].
pub fn diff(
    source: &SourceConfiguration,
    target: &TargetConfiguration,
) -> Result<CapabilityDelta, DeltaError> {
    CapabilityDeltaEngine::new().diff(source, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shift_config::{Skill, SkillDetail, Topic, TopicDetail};

    fn topics(ids: &[&str]) -> CapabilityCollections {
        let mut collections = CapabilityCollections::new();
        collections.topics = ids
            .iter()
            .map(|id| Topic::new(*id, *id, true, TopicDetail::default()).unwrap())
            .collect();
        collections
    }

    fn keys(ids: &[&str]) -> BTreeSet<CapabilityKey> {
        ids.iter()
            .map(|id| CapabilityKey::new(CapabilityKind::Topic, *id))
            .collect()
    }

    #[test]
    fn delta_added_removed_retained() {
        let engine = CapabilityDeltaEngine::new();
        let delta = engine
            .diff_collections(&topics(&["A", "B"]), &topics(&["B", "C", "D"]), &[])
            .unwrap();

        assert_eq!(delta.added, keys(&["C", "D"]));
        assert_eq!(delta.removed, keys(&["A"]));
        assert_eq!(delta.retained, keys(&["B"]));
    }

    #[test]
    fn delta_declared_passthrough_not_deduplicated() {
        let declared = vec!["C".to_string(), "generative answers".to_string()];
        let delta = CapabilityDeltaEngine::new()
            .diff_collections(&topics(&["A"]), &topics(&["C"]), &declared)
            .unwrap();

        assert_eq!(delta.new_capabilities, declared);
        assert!(delta.added.contains(&CapabilityKey::new(CapabilityKind::Topic, "C")));
    }

    #[test]
    fn delta_same_id_different_kind_is_distinct() {
        let source = topics(&["shared"]);
        let mut target = CapabilityCollections::new();
        target.skills = vec![Skill::new("shared", "shared", true, SkillDetail::default()).unwrap()];

        let delta = CapabilityDeltaEngine::new()
            .diff_collections(&source, &target, &[])
            .unwrap();
        assert!(delta.retained.is_empty());
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.removed.len(), 1);
    }

    #[test]
    fn delta_kind_filter() {
        let engine = CapabilityDeltaEngine::new().with_kinds([CapabilityKind::Skill]);
        let delta = engine
            .diff_collections(&topics(&["A"]), &topics(&["B"]), &[])
            .unwrap();
        assert!(delta.is_unchanged());
        assert!(delta.retained.is_empty());
    }

    #[test]
    fn delta_rejects_duplicate_target_ids() {
        let err = CapabilityDeltaEngine::new()
            .diff_collections(&topics(&["A"]), &topics(&["B", "B"]), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            DeltaError::MalformedConfiguration {
                side: Side::Target,
                ..
            }
        ));
    }

    #[test]
    fn delta_summary_counts() {
        let delta = CapabilityDeltaEngine::new()
            .diff_collections(&topics(&["A", "B"]), &topics(&["B", "C", "D"]), &[])
            .unwrap();
        let summary = delta.summary();
        assert_eq!(
            summary[&CapabilityKind::Topic],
            KindSummary {
                added: 2,
                retained: 1,
                removed: 1
            }
        );
        assert_eq!(delta.to_string(), "+2 =1 -1 (declared 0)");
        assert_eq!(delta.added_of(CapabilityKind::Topic).count(), 2);
        assert_eq!(delta.removed_of(CapabilityKind::Entity).count(), 0);
    }

    #[test]
    fn capability_key_display() {
        assert_eq!(
            CapabilityKey::new(CapabilityKind::Flow, "refund").to_string(),
            "flow:refund"
        );
    }
}
