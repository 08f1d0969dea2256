//! Readiness assessment of a source bot
//!
//! Deterministic and free of I/O: derived only from each unit's
//! `migratable` flag.

use serde::{Deserialize, Serialize};
use shift_config::{CapabilityKind, CollectionCounts, SourceConfiguration};

/// A unit that will not be carried over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedUnit {
    pub kind: CapabilityKind,
    pub id: String,
    pub name: String,
}

/// What a migration of this source would carry over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationAssessment {
    pub source_id: String,
    pub totals: CollectionCounts,
    pub migratable: CollectionCounts,
    /// Migratable share of all units, as a rounded percentage
    pub compatibility_score: u8,
    pub blocked: Vec<BlockedUnit>,
}

impl MigrationAssessment {
    /// True when nothing would be left behind
    #[inline]
    #[must_use]
    pub fn is_fully_migratable(&self) -> bool {
        self.blocked.is_empty()
    }
}

/// Assess a source
///
/// An empty source scores 100.
#[must_use]
pub fn assess(source: &SourceConfiguration) -> MigrationAssessment {
    let totals = source.capabilities.counts();
    let migratable = source.capabilities.migratable_only().counts();
    let blocked: Vec<BlockedUnit> = source
        .capabilities
        .iter()
        .filter(|unit| !unit.migratable)
        .map(|unit| BlockedUnit {
            kind: unit.kind,
            id: unit.id.to_string(),
            name: unit.name.to_string(),
        })
        .collect();

    MigrationAssessment {
        source_id: source.id.clone(),
        compatibility_score: score(migratable.total(), totals.total()),
        totals,
        migratable,
        blocked,
    }
}

fn score(migratable: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (migratable * 100 + total / 2) / total;
    u8::try_from(percent).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shift_config::{Skill, SkillDetail, Topic, TopicDetail};

    #[test]
    fn empty_source_scores_full() {
        let source = SourceConfiguration::new("bot-1", "Empty").unwrap();
        let assessment = assess(&source);
        assert_eq!(assessment.compatibility_score, 100);
        assert!(assessment.is_fully_migratable());
    }

    #[test]
    fn blocked_units_listed_with_kind() {
        let source = SourceConfiguration::new("bot-1", "Helpdesk")
            .unwrap()
            .with_topic(Topic::new("a", "A", true, TopicDetail::default()).unwrap())
            .with_topic(Topic::new("b", "B", true, TopicDetail::default()).unwrap())
            .with_skill(Skill::new("c", "C", false, SkillDetail::default()).unwrap());

        let assessment = assess(&source);
        assert_eq!(assessment.compatibility_score, 67);
        assert_eq!(assessment.totals.total(), 3);
        assert_eq!(assessment.migratable.topics, 2);
        assert_eq!(
            assessment.blocked,
            vec![BlockedUnit {
                kind: CapabilityKind::Skill,
                id: "c".to_string(),
                name: "C".to_string(),
            }]
        );
    }

    #[test]
    fn score_rounds() {
        assert_eq!(score(1, 3), 33);
        assert_eq!(score(0, 5), 0);
        assert_eq!(score(5, 5), 100);
    }
}
