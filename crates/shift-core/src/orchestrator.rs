//! Migration orchestrator
//!
//! Plans flows and runs their seven steps strictly in order. A step that
//! fails stops the flow; completed steps keep their results.
//!
//! # Workflow
//! 1. [`MigrationOrchestrator::plan`] builds a fresh flow (no I/O)
//! 2. [`MigrationOrchestrator::run`] executes each step while a progress
//!    ticker animates it, checkpointing the flow after every transition
//! 3. On success the produced agent is stored; on failure the flow is
//!    `Failed` and the agent is marked `Error`

use crate::config::OrchestratorConfig;
use crate::error::{MigrationError, Result, StepFailure};
use crate::progress::{ProgressTicker, TickPolicy, TickerLedger, TickerStats};
use crate::runtime::{Clock, Collaborators, Delay, IdGenerator, RandomSource, TextGenerator};
use crate::steps::{StepAction, StepContext, StepRegistry};
use crate::store::{self, MemoryStore, Store};
use crate::types::{FlowId, FlowStatus, MigrationFlow, ProgressEvent, StepKind};
use shift_config::{AgentStatus, SourceConfiguration, TargetConfiguration};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Buffered progress events per subscriber
const EVENT_CAPACITY: usize = 1024;

/// Runs migration flows
///
/// Cheap to clone; clones share stores, event channel and ticker accounting.
#[derive(Clone)]
pub struct MigrationOrchestrator {
    config: Arc<OrchestratorConfig>,
    collaborators: Collaborators,
    registry: StepRegistry,
    flows: Arc<dyn Store<MigrationFlow>>,
    agents: Arc<dyn Store<TargetConfiguration>>,
    events: broadcast::Sender<ProgressEvent>,
    tickers: Arc<TickerLedger>,
}

impl MigrationOrchestrator {
    /// Create orchestrator with production collaborators and in-memory stores
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if `config` fails validation.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config: Arc::new(config),
            collaborators: Collaborators::default(),
            registry: StepRegistry::with_defaults(),
            flows: Arc::new(MemoryStore::new()),
            agents: Arc::new(MemoryStore::new()),
            events,
            tickers: Arc::new(TickerLedger::default()),
        })
    }

    /// With identifier generator
    #[inline]
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.collaborators.ids = ids;
        self
    }

    /// With clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.collaborators.clock = clock;
        self
    }

    /// With delay primitive
    #[inline]
    #[must_use]
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.collaborators.delay = delay;
        self
    }

    /// With random source
    #[inline]
    #[must_use]
    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.collaborators.random = random;
        self
    }

    /// With text generator for review summaries
    #[inline]
    #[must_use]
    pub fn with_narrator(mut self, narrator: Arc<dyn TextGenerator>) -> Self {
        self.collaborators.narrator = Some(narrator);
        self
    }

    /// With flow store
    #[inline]
    #[must_use]
    pub fn with_flow_store(mut self, flows: Arc<dyn Store<MigrationFlow>>) -> Self {
        self.flows = flows;
        self
    }

    /// With agent store
    #[inline]
    #[must_use]
    pub fn with_agent_store(mut self, agents: Arc<dyn Store<TargetConfiguration>>) -> Self {
        self.agents = agents;
        self
    }

    /// Override the action behind one step
    #[inline]
    #[must_use]
    pub fn with_action(mut self, kind: StepKind, action: Arc<dyn StepAction>) -> Self {
        self.registry = self.registry.with_action(kind, action);
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Receive progress events from every flow this orchestrator runs
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// Progress ticker accounting
    #[must_use]
    pub fn ticker_stats(&self) -> TickerStats {
        self.tickers.snapshot()
    }

    /// Build a fresh flow for `source`
    ///
    /// Seven pending steps, a draft target with empty collections named
    /// `agent_name`, status `Initializing`. Performs no I/O.
    pub fn plan(
        &self,
        source: Arc<SourceConfiguration>,
        agent_name: impl Into<String>,
    ) -> MigrationFlow {
        let now = self.collaborators.clock.now();
        let flow_id = FlowId(self.collaborators.ids.next_id());
        let agent_name = agent_name.into();
        let target = TargetConfiguration::draft(
            self.collaborators.ids.next_id(),
            agent_name.clone(),
            source.id.clone(),
            now,
        );

        tracing::info!(
            flow_id = %flow_id,
            source_id = %source.id,
            steps = StepKind::PLAN.len(),
            "migration planned"
        );
        MigrationFlow::new(flow_id, source, target, agent_name, now)
    }

    /// Execute every step of a freshly planned flow
    ///
    /// # Errors
    /// - [`MigrationError::InvalidFlowState`] if the flow has already run;
    ///   the flow is left untouched
    /// - [`MigrationError::StepActionFailure`] if a step failed; the flow is
    ///   `Failed` and later steps stay pending
    #[tracing::instrument(name = "migration", skip_all, fields(flow_id = %flow.id()))]
    pub async fn run(&self, flow: &mut MigrationFlow) -> Result<()> {
        if !flow.is_fresh() {
            return Err(MigrationError::InvalidFlowState(format!(
                "flow {} is {} and cannot run again",
                flow.id(),
                flow.status()
            )));
        }
        self.checkpoint(flow).await;

        for kind in StepKind::PLAN {
            self.begin_step(flow, kind).await?;

            match self.execute_step(flow, kind).await {
                Ok(details) => self.complete_step(flow, kind, details).await?,
                Err(failure) => return Err(self.fail_flow(flow, kind, failure).await?),
            }
        }

        self.save_agent(flow.target()).await;
        tracing::info!(
            agent_id = %flow.target().id,
            deployment_url = flow.target().deployment_url.as_deref().unwrap_or_default(),
            "migration completed"
        );
        Ok(())
    }

    /// Plan, persist and spawn a flow on the current tokio runtime
    ///
    /// The flow can be polled through [`MigrationOrchestrator::load_flow`]
    /// while it runs; the handle resolves to its terminal state.
    pub async fn launch(
        &self,
        source: Arc<SourceConfiguration>,
        agent_name: impl Into<String>,
    ) -> (FlowId, JoinHandle<MigrationFlow>) {
        let mut flow = self.plan(source, agent_name);
        let flow_id = flow.id().clone();
        self.checkpoint(&flow).await;

        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            // The outcome is recorded on the flow itself
            let _ = orchestrator.run(&mut flow).await;
            flow
        });
        (flow_id, handle)
    }

    /// Fetch the last checkpoint of a flow
    ///
    /// # Errors
    /// Returns [`MigrationError::Persistence`] if missing or the store fails.
    pub async fn load_flow(&self, flow_id: &FlowId) -> Result<MigrationFlow> {
        Ok(store::require(self.flows.as_ref(), flow_id.as_str()).await?)
    }

    /// Fetch a produced agent
    ///
    /// # Errors
    /// Returns [`MigrationError::Persistence`] if missing or the store fails.
    pub async fn load_agent(&self, agent_id: &str) -> Result<TargetConfiguration> {
        Ok(store::require(self.agents.as_ref(), agent_id).await?)
    }

    async fn begin_step(&self, flow: &mut MigrationFlow, kind: StepKind) -> Result<()> {
        let now = self.collaborators.clock.now();
        flow.step_mut(kind).begin(now)?;
        tracing::info!(step = %kind, "step started");
        self.emit(flow, kind);
        self.checkpoint(flow).await;
        Ok(())
    }

    /// Run the step's action under a progress ticker
    async fn execute_step(
        &self,
        flow: &mut MigrationFlow,
        kind: StepKind,
    ) -> std::result::Result<String, StepFailure> {
        let action = self.registry.get(kind);
        let latency = self.config.step_latency.for_step(kind);
        let delay = Arc::clone(&self.collaborators.delay);

        let parts = flow.parts_mut();
        let ticker = ProgressTicker::start(
            parts.id.clone(),
            self.tick_policy(),
            Arc::clone(&self.collaborators.delay),
            Arc::clone(&self.collaborators.random),
            self.events.clone(),
            Arc::clone(&self.tickers),
        );
        let mut ctx = StepContext {
            flow_id: parts.id,
            kind,
            source: parts.source,
            target: parts.target,
            requested_name: parts.requested_name,
            config: &self.config,
            collaborators: &self.collaborators,
        };

        ticker
            .drive(&mut parts.steps[kind.index()], async {
                delay.sleep(latency).await;
                action.execute(&mut ctx).await
            })
            .await
    }

    async fn complete_step(
        &self,
        flow: &mut MigrationFlow,
        kind: StepKind,
        details: String,
    ) -> Result<()> {
        let now = self.collaborators.clock.now();
        tracing::info!(step = %kind, details = %details, "step completed");
        flow.step_mut(kind).complete(details, now)?;
        self.emit(flow, kind);

        if let Some(phase) = kind.phase_after() {
            flow.advance(phase)?;
        } else if kind == StepKind::Deploy {
            flow.finish(FlowStatus::Completed, now)?;
        }
        self.checkpoint(flow).await;
        Ok(())
    }

    /// Record a step failure and stop the flow
    ///
    /// Returns the error to hand back to the caller.
    async fn fail_flow(
        &self,
        flow: &mut MigrationFlow,
        kind: StepKind,
        failure: StepFailure,
    ) -> Result<MigrationError> {
        let now = self.collaborators.clock.now();
        tracing::error!(step = %kind, error = %failure.message, "step failed");

        flow.step_mut(kind).fail(failure.message.clone(), now)?;
        flow.target_mut().status = AgentStatus::Error;
        flow.finish(FlowStatus::Failed, now)?;
        self.emit(flow, kind);
        self.checkpoint(flow).await;

        tracing::warn!(
            completed_steps = flow.completed_steps(),
            "migration stopped"
        );
        Ok(MigrationError::StepActionFailure {
            step: kind,
            message: failure.message,
        })
    }

    fn tick_policy(&self) -> TickPolicy {
        TickPolicy {
            interval: self.config.tick_interval(),
            min_increment: self.config.tick_min_increment,
            max_increment: self.config.tick_max_increment,
            ceiling: self.config.progress_ceiling,
        }
    }

    fn emit(&self, flow: &MigrationFlow, kind: StepKind) {
        let step = flow.step(kind);
        // No receivers is not an error
        let _ = self.events.send(ProgressEvent {
            flow_id: flow.id().clone(),
            step: kind,
            status: step.status(),
            progress: step.progress(),
        });
    }

    /// Persist the flow; failures are logged, never fatal
    async fn checkpoint(&self, flow: &MigrationFlow) {
        if let Err(err) = self.flows.put(flow.id().as_str(), flow.clone()).await {
            tracing::warn!(flow_id = %flow.id(), error = %err, "flow checkpoint failed");
        }
    }

    async fn save_agent(&self, target: &TargetConfiguration) {
        if let Err(err) = self.agents.put(&target.id, target.clone()).await {
            tracing::warn!(agent_id = %target.id, error = %err, "agent save failed");
        }
    }
}

impl std::fmt::Debug for MigrationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationOrchestrator")
            .field("config", &self.config)
            .field("collaborators", &self.collaborators)
            .field("tickers", &self.tickers.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NoDelay;
    use crate::types::StepStatus;
    use shift_config::{Topic, TopicDetail};

    struct AlwaysLow;

    impl RandomSource for AlwaysLow {
        fn next_f64(&self) -> f64 {
            0.0
        }
    }

    fn orchestrator() -> MigrationOrchestrator {
        MigrationOrchestrator::new(OrchestratorConfig::default())
            .unwrap()
            .with_delay(Arc::new(NoDelay))
            .with_random(Arc::new(AlwaysLow))
    }

    fn source() -> Arc<SourceConfiguration> {
        Arc::new(
            SourceConfiguration::new("bot-1", "Helpdesk")
                .unwrap()
                .with_topic(Topic::new("greet", "Greeting", true, TopicDetail::default()).unwrap()),
        )
    }

    struct Refuse;

    #[async_trait::async_trait]
    impl StepAction for Refuse {
        async fn execute(&self, _ctx: &mut StepContext<'_>) -> std::result::Result<String, StepFailure> {
            Err(StepFailure::new("source bot unreachable"))
        }
    }

    #[test]
    fn new_rejects_invalid_config() {
        let err = MigrationOrchestrator::new(
            OrchestratorConfig::default().with_check_pass_probability(-0.1),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn plan_is_fresh() {
        let flow = orchestrator().plan(source(), "Helper");
        assert!(flow.is_fresh());
        assert_eq!(flow.target().name, "Helper");
        assert_eq!(flow.target().source_id, "bot-1");
        assert_eq!(flow.target().status, AgentStatus::Draft);
        assert!(flow.target().capabilities.is_empty());
        assert_ne!(flow.id().as_str(), flow.target().id);
    }

    #[tokio::test]
    async fn run_completes_and_stores_agent() {
        let orchestrator = orchestrator();
        let mut flow = orchestrator.plan(source(), "Helper");
        orchestrator.run(&mut flow).await.unwrap();

        assert_eq!(flow.status(), FlowStatus::Completed);
        assert_eq!(flow.progress_percent(), 100);
        let agent = orchestrator.load_agent(&flow.target().id).await.unwrap();
        assert!(agent.is_published());
        let stored = orchestrator.load_flow(flow.id()).await.unwrap();
        assert_eq!(stored, flow);
    }

    #[tokio::test]
    async fn first_step_failure_stops_everything() {
        let orchestrator = orchestrator().with_action(StepKind::OpenSource, Arc::new(Refuse));
        let mut flow = orchestrator.plan(source(), "Helper");
        let err = orchestrator.run(&mut flow).await.unwrap_err();

        assert_eq!(err.failed_step(), Some(StepKind::OpenSource));
        assert_eq!(flow.status(), FlowStatus::Failed);
        assert_eq!(flow.target().status, AgentStatus::Error);
        assert_eq!(flow.step(StepKind::OpenSource).error(), Some("source bot unreachable"));
        assert!(flow.steps()[1..]
            .iter()
            .all(|s| s.status() == StepStatus::Pending));
        assert!(orchestrator.load_agent(&flow.target().id).await.is_err());
    }

    #[tokio::test]
    async fn load_missing_flow() {
        let err = orchestrator()
            .load_flow(&FlowId("nope".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::Persistence(_)));
    }
}
