//! Step catalogue
//!
//! Each [`StepKind`] is backed by a [`StepAction`]. The [`StepRegistry`]
//! holds the built-in actions and lets a caller override any of them, which
//! is how test harnesses force a step to fail.

use crate::config::{OrchestratorConfig, TestGate};
use crate::error::StepFailure;
use crate::runtime::Collaborators;
use crate::types::{FlowId, StepKind};
use shift_config::{
    AgentStatus, EntityKind, FlowTrigger, SourceConfiguration, TargetConfiguration, TopicKind,
};
use shift_delta::CapabilityDeltaEngine;
use std::fmt::Write as _;
use std::sync::Arc;

/// Everything a step action may read or change
///
/// Only the target is mutable; the source is a read-only snapshot.
pub struct StepContext<'a> {
    pub flow_id: &'a FlowId,
    pub kind: StepKind,
    pub source: &'a SourceConfiguration,
    pub target: &'a mut TargetConfiguration,
    pub requested_name: &'a str,
    pub config: &'a OrchestratorConfig,
    pub collaborators: &'a Collaborators,
}

/// The work behind one step
///
/// Returns the step's result message, or a failure whose message is
/// recorded verbatim on the step.
#[async_trait::async_trait]
pub trait StepAction: Send + Sync {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure>;
}

/// Confirms the source snapshot is readable
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSource;

#[async_trait::async_trait]
impl StepAction for OpenSource {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        ctx.source.validate()?;
        Ok(format!(
            "Opened bot '{}' with {} capability units",
            ctx.source.name,
            ctx.source.capabilities.len()
        ))
    }
}

/// Copies migratable units into the target
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneAndConvert;

#[async_trait::async_trait]
impl StepAction for CloneAndConvert {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        let copied = ctx.source.capabilities.migratable_only();
        let counts = copied.counts();
        let skipped = ctx.source.capabilities.len() - copied.len();

        ctx.target.capabilities = copied;
        ctx.target.description = ctx.source.description.clone();

        Ok(format!(
            "Copied {counts}; {skipped} non-migratable units left behind"
        ))
    }
}

/// Names the agent and registers it
#[derive(Debug, Clone, Copy, Default)]
pub struct NameAndCreate;

#[async_trait::async_trait]
impl StepAction for NameAndCreate {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        ctx.requested_name.clone_into(&mut ctx.target.name);
        ctx.target
            .declared_capabilities
            .clone_from(&ctx.config.agent_capabilities);

        Ok(format!(
            "Created agent '{}' ({}) with {} built-in capabilities",
            ctx.target.name,
            ctx.target.id,
            ctx.target.declared_capabilities.len()
        ))
    }
}

/// Reports sub-counts of the migrated content
///
/// Does not change the target. The narrative summary is best-effort: any
/// generator failure falls back to a canned sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewContent;

impl ReviewContent {
    fn fallback_summary(target: &TargetConfiguration) -> String {
        format!(
            "Agent '{}' is ready for settings review with {} migrated capability units.",
            target.name,
            target.capabilities.len()
        )
    }

    fn prompt(source: &SourceConfiguration, target: &TargetConfiguration) -> String {
        format!(
            "Summarize in one paragraph the migration of bot '{}' into agent '{}'. \
             Migrated content: {}.",
            source.name,
            target.name,
            target.capabilities.counts()
        )
    }
}

#[async_trait::async_trait]
impl StepAction for ReviewContent {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        let caps = &ctx.target.capabilities;
        let topics_of = |kind: TopicKind| caps.topics.iter().filter(|t| t.detail.kind == kind).count();
        let entities_of =
            |kind: EntityKind| caps.entities.iter().filter(|e| e.detail.kind == kind).count();
        let flows_of =
            |trigger: FlowTrigger| caps.flows.iter().filter(|f| f.detail.trigger == trigger).count();

        let delta = CapabilityDeltaEngine::new().diff(ctx.source, ctx.target)?;

        let mut details = String::new();
        // Writing to a String cannot fail
        let _ = write!(
            details,
            "Reviewed {} topics ({} custom, {} system, {} fallback), \
             {} entities ({} prebuilt, {} closed list, {} regex), \
             {} flows ({} topic, {} scheduled, {} event triggered); \
             {} source capabilities not carried over.",
            caps.topics.len(),
            topics_of(TopicKind::Custom),
            topics_of(TopicKind::System),
            topics_of(TopicKind::Fallback),
            caps.entities.len(),
            entities_of(EntityKind::Prebuilt),
            entities_of(EntityKind::ClosedList),
            entities_of(EntityKind::Regex),
            caps.flows.len(),
            flows_of(FlowTrigger::Topic),
            flows_of(FlowTrigger::Schedule),
            flows_of(FlowTrigger::Event),
            delta.removed.len(),
        );

        let prompt = Self::prompt(ctx.source, ctx.target);
        let summary = match ctx.collaborators.narrate(&prompt).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    flow_id = %ctx.flow_id,
                    error = %err,
                    "summary generation unavailable, using fallback"
                );
                Self::fallback_summary(ctx.target)
            }
        };
        let _ = write!(details, " {}", summary.trim());

        Ok(details)
    }
}

/// Carries authorization over; flags channels and skills for manual work
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconfigureSettings;

#[async_trait::async_trait]
impl StepAction for ReconfigureSettings {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        ctx.target.auth = ctx.source.auth.clone();

        Ok(format!(
            "Carried over {} authentication; {} channels and {} skills require manual reconfiguration",
            ctx.target.auth.mode,
            ctx.source.capabilities.channels.len(),
            ctx.source.capabilities.skills.len()
        ))
    }
}

/// The fixed validation battery
pub const TEST_CHECKS: [&str; 6] = [
    "topic validation",
    "entity recognition",
    "automation integration",
    "channel connectivity",
    "authorization security",
    "custom component integration",
];

/// Runs the validation battery
///
/// Each check passes independently with the configured probability. The
/// outcomes are random on purpose: this is a simulation, not a test runner.
/// Whether a poor result fails the step is decided by [`TestGate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTests;

#[async_trait::async_trait]
impl StepAction for RunTests {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        ctx.target.status = AgentStatus::Testing;

        let random = &ctx.collaborators.random;
        let failed: Vec<&str> = TEST_CHECKS
            .iter()
            .copied()
            .filter(|_| random.next_f64() >= ctx.config.check_pass_probability)
            .collect();
        let total = TEST_CHECKS.len();
        let passed = total - failed.len();

        if passed == 0 && ctx.config.test_gate == TestGate::RequireAnyPass {
            return Err(StepFailure::new(format!("all {total} checks failed")));
        }

        let mut details = format!("{passed}/{total} checks passed");
        if !failed.is_empty() {
            let _ = write!(details, "; failed: {}", failed.join(", "));
        }
        Ok(details)
    }
}

/// Publishes the agent
#[derive(Debug, Clone, Copy, Default)]
pub struct Deploy;

#[async_trait::async_trait]
impl StepAction for Deploy {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        let url = format!(
            "{}/{}",
            ctx.config.deployment_base_url.trim_end_matches('/'),
            ctx.target.id
        );
        ctx.target.deployment_url = Some(url.clone());
        ctx.target.status = AgentStatus::Published;
        ctx.target.published_at = Some(ctx.collaborators.clock.now());

        Ok(format!("Deployed to {url}"))
    }
}

/// Actions by step kind
#[derive(Clone)]
pub struct StepRegistry {
    actions: Vec<Arc<dyn StepAction>>,
}

impl StepRegistry {
    /// Registry with the built-in catalogue
    #[must_use]
    pub fn with_defaults() -> Self {
        let actions = StepKind::PLAN
            .iter()
            .map(|kind| -> Arc<dyn StepAction> {
                match kind {
                    StepKind::OpenSource => Arc::new(OpenSource),
                    StepKind::CloneAndConvert => Arc::new(CloneAndConvert),
                    StepKind::NameAndCreate => Arc::new(NameAndCreate),
                    StepKind::ReviewContent => Arc::new(ReviewContent),
                    StepKind::ReconfigureSettings => Arc::new(ReconfigureSettings),
                    StepKind::RunTests => Arc::new(RunTests),
                    StepKind::Deploy => Arc::new(Deploy),
                }
            })
            .collect();
        Self { actions }
    }

    /// Replace the action behind one step
    #[must_use]
    pub fn with_action(mut self, kind: StepKind, action: Arc<dyn StepAction>) -> Self {
        self.actions[kind.index()] = action;
        self
    }

    /// Action for a step
    #[inline]
    #[must_use]
    pub fn get(&self, kind: StepKind) -> Arc<dyn StepAction> {
        Arc::clone(&self.actions[kind.index()])
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("actions", &self.actions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::runtime::{RandomSource, TextGenerator};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use shift_config::{
        AuthDescriptor, AuthMode, Channel, ChannelDetail, Entity, EntityDetail, Skill,
        SkillDetail, Topic, TopicDetail,
    };

    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn next_f64(&self) -> f64 {
            self.0
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            Ok("A tidy migration.".to_string())
        }
    }

    struct Down;

    #[async_trait::async_trait]
    impl TextGenerator for Down {
        async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Unreachable("timeout".to_string()))
        }
    }

    fn source() -> SourceConfiguration {
        SourceConfiguration::new("bot-1", "Helpdesk")
            .unwrap()
            .with_description("IT helpdesk")
            .with_auth(AuthDescriptor::new(AuthMode::Manual).with_provider("entra"))
            .with_topic(Topic::new("greet", "Greeting", true, TopicDetail::default()).unwrap())
            .with_topic(
                Topic::new(
                    "legacy",
                    "Legacy",
                    false,
                    TopicDetail {
                        kind: TopicKind::System,
                        trigger_phrases: Vec::new(),
                    },
                )
                .unwrap(),
            )
            .with_entity(
                Entity::new(
                    "date",
                    "Date",
                    true,
                    EntityDetail {
                        kind: EntityKind::Prebuilt,
                        values: Vec::new(),
                    },
                )
                .unwrap(),
            )
            .with_channel(Channel::new("teams", "Teams", true, ChannelDetail::default()).unwrap())
            .with_skill(Skill::new("weather", "Weather", false, SkillDetail::default()).unwrap())
    }

    fn collaborators(random: f64) -> Collaborators {
        Collaborators {
            random: Arc::new(Fixed(random)),
            ..Collaborators::default()
        }
    }

    async fn run(
        action: &dyn StepAction,
        kind: StepKind,
        source: &SourceConfiguration,
        target: &mut TargetConfiguration,
        config: &OrchestratorConfig,
        collaborators: &Collaborators,
    ) -> Result<String, StepFailure> {
        let flow_id = FlowId("flow-1".to_string());
        let mut ctx = StepContext {
            flow_id: &flow_id,
            kind,
            source,
            target,
            requested_name: "Helper",
            config,
            collaborators,
        };
        action.execute(&mut ctx).await
    }

    fn draft() -> TargetConfiguration {
        TargetConfiguration::draft("agent-1", "Helper", "bot-1", Utc::now())
    }

    #[tokio::test]
    async fn clone_filters_non_migratable() {
        let source = source();
        let mut target = draft();
        let details = run(
            &CloneAndConvert,
            StepKind::CloneAndConvert,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators(0.0),
        )
        .await
        .unwrap();

        let ids: Vec<&str> = target.capabilities.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec!["greet", "date", "teams"]);
        assert_eq!(target.description, "IT helpdesk");
        assert_eq!(
            details,
            "Copied 1 topics, 1 entities, 0 flows, 1 channels, 0 skills, 0 components; \
             2 non-migratable units left behind"
        );
    }

    #[tokio::test]
    async fn name_and_create_declares_capabilities() {
        let source = source();
        let mut target = TargetConfiguration::draft("agent-1", "", "bot-1", Utc::now());
        run(
            &NameAndCreate,
            StepKind::NameAndCreate,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators(0.0),
        )
        .await
        .unwrap();
        assert_eq!(target.name, "Helper");
        assert_eq!(target.declared_capabilities.len(), 5);
    }

    #[tokio::test]
    async fn review_falls_back_when_generator_fails() {
        let source = source();
        let mut target = draft();
        target.capabilities = source.capabilities.migratable_only();
        let before = target.clone();

        let collaborators = Collaborators {
            narrator: Some(Arc::new(Down)),
            ..collaborators(0.0)
        };
        let details = run(
            &ReviewContent,
            StepKind::ReviewContent,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators,
        )
        .await
        .unwrap();

        assert_eq!(target, before);
        assert!(details.starts_with("Reviewed 1 topics (1 custom, 0 system, 0 fallback)"));
        assert!(details.contains("1 entities (1 prebuilt"));
        assert!(details.contains("2 source capabilities not carried over"));
        assert!(details.ends_with("with 3 migrated capability units."));
    }

    #[tokio::test]
    async fn review_uses_generated_summary() {
        let source = source();
        let mut target = draft();
        let collaborators = Collaborators {
            narrator: Some(Arc::new(Echo)),
            ..collaborators(0.0)
        };
        let details = run(
            &ReviewContent,
            StepKind::ReviewContent,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators,
        )
        .await
        .unwrap();
        assert!(details.ends_with("A tidy migration."));
    }

    #[tokio::test]
    async fn reconfigure_copies_auth() {
        let source = source();
        let mut target = draft();
        let details = run(
            &ReconfigureSettings,
            StepKind::ReconfigureSettings,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators(0.0),
        )
        .await
        .unwrap();
        assert_eq!(target.auth, source.auth);
        assert_eq!(
            details,
            "Carried over manual authentication; 1 channels and 1 skills require manual reconfiguration"
        );
    }

    #[tokio::test]
    async fn run_tests_reports_passed_over_total() {
        let source = source();
        let mut target = draft();
        let details = run(
            &RunTests,
            StepKind::RunTests,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators(0.1),
        )
        .await
        .unwrap();
        assert_eq!(details, "6/6 checks passed");
        assert_eq!(target.status, AgentStatus::Testing);
    }

    #[tokio::test]
    async fn run_tests_gate() {
        let source = source();
        let mut target = draft();
        let err = run(
            &RunTests,
            StepKind::RunTests,
            &source,
            &mut target,
            &OrchestratorConfig::default(),
            &collaborators(0.95),
        )
        .await
        .unwrap_err();
        assert_eq!(err.message, "all 6 checks failed");

        let advisory = OrchestratorConfig::default().with_test_gate(TestGate::Advisory);
        let details = run(
            &RunTests,
            StepKind::RunTests,
            &source,
            &mut target,
            &advisory,
            &collaborators(0.95),
        )
        .await
        .unwrap();
        assert!(details.starts_with("0/6 checks passed; failed: topic validation"));
    }

    #[tokio::test]
    async fn deploy_publishes() {
        let source = source();
        let mut target = draft();
        let config = OrchestratorConfig::default().with_deployment_base_url("https://x.test/");
        let details = run(
            &Deploy,
            StepKind::Deploy,
            &source,
            &mut target,
            &config,
            &collaborators(0.0),
        )
        .await
        .unwrap();
        assert_eq!(target.deployment_url.as_deref(), Some("https://x.test/agent-1"));
        assert!(target.is_published());
        assert!(target.published_at.is_some());
        assert_eq!(details, "Deployed to https://x.test/agent-1");
    }

    #[test]
    fn registry_override() {
        struct Nope;

        #[async_trait::async_trait]
        impl StepAction for Nope {
            async fn execute(&self, _ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
                Err(StepFailure::new("nope"))
            }
        }

        let nope: Arc<dyn StepAction> = Arc::new(Nope);
        let registry = StepRegistry::with_defaults().with_action(StepKind::Deploy, Arc::clone(&nope));
        assert!(Arc::ptr_eq(&registry.get(StepKind::Deploy), &nope));
        assert!(!Arc::ptr_eq(&registry.get(StepKind::RunTests), &nope));
    }
}
