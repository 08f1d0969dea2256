//! Testing utilities for Shift workspace
//!
//! Deterministic collaborators, failure injectors and source fixtures.

#![allow(missing_docs)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use shift_config::{
    AuthDescriptor, AuthMode, AutomationFlow, Channel, ChannelDetail, Component, ComponentDetail,
    Entity, EntityDetail, EntityKind, FlowDetail, FlowTrigger, Skill, SkillDetail,
    SourceConfiguration, Topic, TopicDetail, TopicKind,
};
use shift_core::{
    Clock, CollaboratorError, IdGenerator, MigrationOrchestrator, OrchestratorConfig,
    RandomSource, StepAction, StepContext, StepFailure, Store, StoreError, TextGenerator,
    TokioDelay,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// `prefix-1`, `prefix-2`, ...
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}

/// Clock that advances a fixed step on every read
#[derive(Debug)]
pub struct SteppingClock {
    start: DateTime<Utc>,
    step: ChronoDuration,
    reads: AtomicI32,
}

impl SteppingClock {
    pub fn new(step_secs: i64) -> Self {
        Self {
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            step: ChronoDuration::seconds(step_secs),
            reads: AtomicI32::new(0),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        self.start + self.step * n
    }
}

/// Always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}

/// Plays back a script, then repeats the fallback
#[derive(Debug)]
pub struct ScriptedRandom {
    script: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(script: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&self) -> f64 {
        self.script.lock().pop_front().unwrap_or(self.fallback)
    }
}

/// Generator that always answers with fixed text
#[derive(Debug, Clone)]
pub struct EchoNarrator(pub String);

#[async_trait::async_trait]
impl TextGenerator for EchoNarrator {
    async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        Ok(self.0.clone())
    }
}

/// Generator that is never reachable
#[derive(Debug, Clone, Copy)]
pub struct FailingNarrator;

#[async_trait::async_trait]
impl TextGenerator for FailingNarrator {
    async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Unreachable("connection refused".to_string()))
    }
}

/// Generator that answers after a delay
#[derive(Debug, Clone)]
pub struct SlowNarrator {
    pub latency: Duration,
    pub text: String,
}

#[async_trait::async_trait]
impl TextGenerator for SlowNarrator {
    async fn generate(&self, _prompt: &str) -> Result<String, CollaboratorError> {
        tokio::time::sleep(self.latency).await;
        Ok(self.text.clone())
    }
}

/// Store whose every operation fails
#[derive(Debug, Clone, Copy)]
pub struct FailingStore;

#[async_trait::async_trait]
impl<T> Store<T> for FailingStore
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, _id: &str) -> Result<Option<T>, StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }

    async fn put(&self, _id: &str, _record: T) -> Result<(), StoreError> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}

/// Store that keeps every record written to it, in write order
#[derive(Debug)]
pub struct RecordingStore<T> {
    writes: Arc<Mutex<Vec<(String, T)>>>,
}

impl<T: Clone> RecordingStore<T> {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `put` so far
    pub fn writes(&self) -> Vec<(String, T)> {
        self.writes.lock().clone()
    }
}

impl<T: Clone> Default for RecordingStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RecordingStore<T> {
    fn clone(&self) -> Self {
        Self {
            writes: Arc::clone(&self.writes),
        }
    }
}

#[async_trait::async_trait]
impl<T> Store<T> for RecordingStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self
            .writes
            .lock()
            .iter()
            .rev()
            .find(|(key, _)| key == id)
            .map(|(_, record)| record.clone()))
    }

    async fn put(&self, id: &str, record: T) -> Result<(), StoreError> {
        self.writes.lock().push((id.to_string(), record));
        Ok(())
    }
}

/// Step action that fails with a fixed message after an optional delay
#[derive(Debug, Clone)]
pub struct FailingAction {
    pub message: String,
    pub after: Duration,
}

impl FailingAction {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            after: Duration::ZERO,
        }
    }

    pub fn after(mut self, after: Duration) -> Self {
        self.after = after;
        self
    }
}

#[async_trait::async_trait]
impl StepAction for FailingAction {
    async fn execute(&self, _ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        if !self.after.is_zero() {
            tokio::time::sleep(self.after).await;
        }
        Err(StepFailure::new(self.message.clone()))
    }
}

/// Helpdesk bot: 3 topics (2 migratable), 2 entities, 2 flows, one channel,
/// one non-migratable skill and one non-migratable component
pub fn sample_source() -> SourceConfiguration {
    SourceConfiguration::new("bot-helpdesk", "IT Helpdesk")
        .unwrap()
        .with_description("Answers password and hardware questions")
        .with_auth(
            AuthDescriptor::new(AuthMode::Manual)
                .with_provider("entra")
                .with_scopes(["profile", "openid"]),
        )
        .with_topic(
            Topic::new(
                "reset-password",
                "Reset password",
                true,
                TopicDetail {
                    kind: TopicKind::Custom,
                    trigger_phrases: vec!["forgot password".to_string()],
                },
            )
            .unwrap(),
        )
        .with_topic(
            Topic::new(
                "greeting",
                "Greeting",
                true,
                TopicDetail {
                    kind: TopicKind::System,
                    trigger_phrases: vec!["hello".to_string()],
                },
            )
            .unwrap(),
        )
        .with_topic(
            Topic::new(
                "legacy-escalation",
                "Legacy escalation",
                false,
                TopicDetail::default(),
            )
            .unwrap(),
        )
        .with_entity(
            Entity::new(
                "device-type",
                "Device type",
                true,
                EntityDetail {
                    kind: EntityKind::ClosedList,
                    values: vec!["laptop".to_string(), "phone".to_string()],
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
        .with_flow(
            AutomationFlow::new(
                "create-ticket",
                "Create ticket",
                true,
                FlowDetail {
                    trigger: FlowTrigger::Topic,
                    connector: Some("servicenow".to_string()),
                },
            )
            .unwrap(),
        )
        .with_flow(
            AutomationFlow::new(
                "nightly-report",
                "Nightly report",
                true,
                FlowDetail {
                    trigger: FlowTrigger::Schedule,
                    connector: None,
                },
            )
            .unwrap(),
        )
        .with_channel(
            Channel::new(
                "teams",
                "Microsoft Teams",
                true,
                ChannelDetail {
                    platform: "teams".to_string(),
                },
            )
            .unwrap(),
        )
        .with_skill(
            Skill::new(
                "weather",
                "Weather skill",
                false,
                SkillDetail {
                    endpoint: Some("https://skills.example.com/weather".to_string()),
                },
            )
            .unwrap(),
        )
        .with_component(
            Component::new(
                "adaptive-card",
                "Adaptive card renderer",
                false,
                ComponentDetail {
                    component_type: "card".to_string(),
                },
            )
            .unwrap(),
        )
}

/// Config with short latencies so paused-time tests stay readable
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_step_latency(shift_core::StepLatency::uniform(1000))
        .with_tick_interval(Duration::from_millis(200))
}

/// Deterministic orchestrator over tokio timers
///
/// Use with `#[tokio::test(start_paused = true)]`. All checks pass and
/// every tick adds the minimum increment.
pub fn test_orchestrator(config: OrchestratorConfig) -> MigrationOrchestrator {
    MigrationOrchestrator::new(config)
        .unwrap()
        .with_ids(Arc::new(SequentialIds::new("id")))
        .with_clock(Arc::new(SteppingClock::new(1)))
        .with_delay(Arc::new(TokioDelay))
        .with_random(Arc::new(FixedRandom(0.0)))
}
