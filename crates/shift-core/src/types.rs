//! Core types for migration flows
//!
//! Defines:
//! - Flow identifiers
//! - The fixed seven-step plan ([`StepKind`])
//! - Step and flow status machines
//! - [`MigrationStep`] and the [`MigrationFlow`] aggregate
//! - Progress events streamed to observers

use crate::error::MigrationError;
use crate::state_machine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shift_config::{SourceConfiguration, TargetConfiguration};
use shift_delta::{CapabilityDelta, CapabilityDeltaEngine, DeltaError};
use std::fmt;
use std::sync::Arc;

/// Opaque flow identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

impl FlowId {
    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for FlowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The seven steps of a migration, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    OpenSource,
    CloneAndConvert,
    NameAndCreate,
    #[serde(rename = "review-migrated-content")]
    ReviewContent,
    ReconfigureSettings,
    RunTests,
    Deploy,
}

impl StepKind {
    /// Fixed execution order
    pub const PLAN: [StepKind; 7] = [
        StepKind::OpenSource,
        StepKind::CloneAndConvert,
        StepKind::NameAndCreate,
        StepKind::ReviewContent,
        StepKind::ReconfigureSettings,
        StepKind::RunTests,
        StepKind::Deploy,
    ];

    /// Stable step identifier
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            StepKind::OpenSource => "open-source",
            StepKind::CloneAndConvert => "clone-and-convert",
            StepKind::NameAndCreate => "name-and-create",
            StepKind::ReviewContent => "review-migrated-content",
            StepKind::ReconfigureSettings => "reconfigure-settings",
            StepKind::RunTests => "run-tests",
            StepKind::Deploy => "deploy",
        }
    }

    /// Human name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::OpenSource => "Open source bot",
            StepKind::CloneAndConvert => "Clone and convert",
            StepKind::NameAndCreate => "Name and create agent",
            StepKind::ReviewContent => "Review migrated content",
            StepKind::ReconfigureSettings => "Reconfigure settings",
            StepKind::RunTests => "Run tests",
            StepKind::Deploy => "Deploy",
        }
    }

    /// Human description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            StepKind::OpenSource => "Connect to the source bot and confirm it can be read",
            StepKind::CloneAndConvert => {
                "Copy migratable topics, entities, flows and channels into the agent"
            }
            StepKind::NameAndCreate => "Name the agent and register it as a draft",
            StepKind::ReviewContent => "Summarize what was carried over and what was left behind",
            StepKind::ReconfigureSettings => {
                "Carry over authentication and flag channel and skill settings"
            }
            StepKind::RunTests => "Run the validation battery against the agent",
            StepKind::Deploy => "Publish the agent and assign its endpoint",
        }
    }

    /// Zero-based position in the plan
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            StepKind::OpenSource => 0,
            StepKind::CloneAndConvert => 1,
            StepKind::NameAndCreate => 2,
            StepKind::ReviewContent => 3,
            StepKind::ReconfigureSettings => 4,
            StepKind::RunTests => 5,
            StepKind::Deploy => 6,
        }
    }

    /// Coarse flow phase entered once this step completes
    ///
    /// Run-tests and deploy leave the phase at `Deploying`; the flow only
    /// becomes `Completed` after the last step.
    #[must_use]
    pub fn phase_after(&self) -> Option<FlowStatus> {
        match self {
            StepKind::OpenSource => Some(FlowStatus::Cloning),
            StepKind::CloneAndConvert => Some(FlowStatus::Converting),
            StepKind::NameAndCreate => Some(FlowStatus::Configuring),
            StepKind::ReviewContent => Some(FlowStatus::Testing),
            StepKind::ReconfigureSettings => Some(FlowStatus::Deploying),
            StepKind::RunTests | StepKind::Deploy => None,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl StepStatus {
    /// Completed or errored
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }
}

/// Overall flow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowStatus {
    Initializing,
    Cloning,
    Converting,
    Configuring,
    Testing,
    Deploying,
    Completed,
    Failed,
}

impl FlowStatus {
    /// Completed or failed
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStatus::Completed | FlowStatus::Failed)
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlowStatus::Initializing => "initializing",
            FlowStatus::Cloning => "cloning",
            FlowStatus::Converting => "converting",
            FlowStatus::Configuring => "configuring",
            FlowStatus::Testing => "testing",
            FlowStatus::Deploying => "deploying",
            FlowStatus::Completed => "completed",
            FlowStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One unit of work in a flow
///
/// # Invariants
/// - `progress == 100` iff `status == Completed`
/// - `status == Error` implies `error.is_some()`
/// - status never moves backward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStep {
    id: String,
    kind: StepKind,
    name: String,
    description: String,
    status: StepStatus,
    progress: u8,
    details: String,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl MigrationStep {
    /// Fresh pending step
    #[must_use]
    pub fn pending(kind: StepKind) -> Self {
        Self {
            id: kind.id().to_string(),
            kind,
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            status: StepStatus::Pending,
            progress: 0,
            details: String::new(),
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Progress percentage in [0, 100]
    #[inline]
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Result message of the step action
    #[inline]
    #[must_use]
    pub fn details(&self) -> &str {
        &self.details
    }

    /// Verbatim failure message
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[inline]
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub(crate) fn begin(&mut self, now: DateTime<Utc>) -> Result<(), MigrationError> {
        self.transition(StepStatus::InProgress)?;
        self.progress = 0;
        self.started_at = Some(now);
        Ok(())
    }

    /// Raise in-progress percentage; never lowers it and never reaches 100
    ///
    /// Returns true if the value changed.
    pub(crate) fn advance_progress(&mut self, progress: u8) -> bool {
        if self.status != StepStatus::InProgress {
            return false;
        }
        let progress = progress.min(99);
        if progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub(crate) fn complete(
        &mut self,
        details: String,
        now: DateTime<Utc>,
    ) -> Result<(), MigrationError> {
        self.transition(StepStatus::Completed)?;
        self.progress = 100;
        self.details = details;
        self.finished_at = Some(now);
        Ok(())
    }

    pub(crate) fn fail(&mut self, message: String, now: DateTime<Utc>) -> Result<(), MigrationError> {
        self.transition(StepStatus::Error)?;
        self.details = format!("{} failed", self.name);
        self.error = Some(message);
        self.finished_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, to: StepStatus) -> Result<(), MigrationError> {
        state_machine::validate_step_transition(self.status, to).map_err(|_| {
            MigrationError::InvalidFlowState(format!(
                "step {} cannot move from {:?} to {:?}",
                self.id, self.status, to
            ))
        })?;
        self.status = to;
        Ok(())
    }
}

/// One end-to-end migration attempt
///
/// Owns its steps and target exclusively; the source is shared read-only.
/// Decoding rejects any step list that is not the fixed seven-step plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FlowRecord")]
pub struct MigrationFlow {
    id: FlowId,
    source: Arc<SourceConfiguration>,
    target: TargetConfiguration,
    requested_name: String,
    steps: Vec<MigrationStep>,
    status: FlowStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl MigrationFlow {
    pub(crate) fn new(
        id: FlowId,
        source: Arc<SourceConfiguration>,
        target: TargetConfiguration,
        requested_name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            source,
            target,
            requested_name,
            steps: StepKind::PLAN.iter().copied().map(MigrationStep::pending).collect(),
            status: FlowStatus::Initializing,
            created_at,
            completed_at: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &FlowId {
        &self.id
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &SourceConfiguration {
        &self.source
    }

    /// Shared handle to the source snapshot
    #[inline]
    #[must_use]
    pub fn source_handle(&self) -> Arc<SourceConfiguration> {
        Arc::clone(&self.source)
    }

    #[inline]
    #[must_use]
    pub fn target(&self) -> &TargetConfiguration {
        &self.target
    }

    /// Display name requested for the agent
    #[inline]
    #[must_use]
    pub fn requested_name(&self) -> &str {
        &self.requested_name
    }

    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Step by kind
    #[inline]
    #[must_use]
    pub fn step(&self, kind: StepKind) -> &MigrationStep {
        &self.steps[kind.index()]
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> FlowStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the flow completed or stopped
    #[inline]
    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// True when no step has started yet
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.status == FlowStatus::Initializing
            && self.steps.iter().all(|s| s.status == StepStatus::Pending)
    }

    /// Step currently in progress, if any
    #[must_use]
    pub fn current_step(&self) -> Option<&MigrationStep> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
    }

    /// Step that failed the flow, if any
    #[must_use]
    pub fn failed_step(&self) -> Option<&MigrationStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Error)
    }

    /// Number of completed steps
    #[must_use]
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Average step progress
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.steps.is_empty() {
            return 0;
        }
        let sum: usize = self.steps.iter().map(|s| usize::from(s.progress)).sum();
        u8::try_from(sum / self.steps.len()).unwrap_or(100)
    }

    /// Capability delta between the source and the current target
    ///
    /// # Errors
    /// Returns [`DeltaError`] if either side is malformed.
    pub fn capability_delta(&self) -> Result<CapabilityDelta, DeltaError> {
        CapabilityDeltaEngine::new().diff(&self.source, &self.target)
    }

    pub(crate) fn step_mut(&mut self, kind: StepKind) -> &mut MigrationStep {
        &mut self.steps[kind.index()]
    }

    pub(crate) fn target_mut(&mut self) -> &mut TargetConfiguration {
        &mut self.target
    }

    pub(crate) fn parts_mut(&mut self) -> FlowParts<'_> {
        FlowParts {
            id: &self.id,
            source: &self.source,
            target: &mut self.target,
            requested_name: &self.requested_name,
            steps: &mut self.steps,
        }
    }

    pub(crate) fn advance(&mut self, to: FlowStatus) -> Result<(), MigrationError> {
        state_machine::validate_flow_transition(self.status, to).map_err(|_| {
            MigrationError::InvalidFlowState(format!(
                "flow {} cannot move from {} to {}",
                self.id, self.status, to
            ))
        })?;
        self.status = to;
        Ok(())
    }

    pub(crate) fn finish(&mut self, to: FlowStatus, now: DateTime<Utc>) -> Result<(), MigrationError> {
        self.advance(to)?;
        self.completed_at = Some(now);
        Ok(())
    }
}

/// Undecoded form of a [`MigrationFlow`]
#[derive(Deserialize)]
struct FlowRecord {
    id: FlowId,
    source: Arc<SourceConfiguration>,
    target: TargetConfiguration,
    requested_name: String,
    steps: Vec<MigrationStep>,
    status: FlowStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<FlowRecord> for MigrationFlow {
    type Error = String;

    fn try_from(record: FlowRecord) -> Result<Self, Self::Error> {
        if record.steps.len() != StepKind::PLAN.len() {
            return Err(format!(
                "flow {} has {} steps, expected {}",
                record.id,
                record.steps.len(),
                StepKind::PLAN.len()
            ));
        }
        for (step, expected) in record.steps.iter().zip(StepKind::PLAN) {
            if step.kind != expected || step.id != expected.id() {
                return Err(format!(
                    "flow {} has step '{}' where '{}' belongs",
                    record.id, step.id, expected
                ));
            }
            if step.progress > 100 {
                return Err(format!(
                    "flow {} step '{}' reports progress {}",
                    record.id, step.id, step.progress
                ));
            }
        }
        Ok(Self {
            id: record.id,
            source: record.source,
            target: record.target,
            requested_name: record.requested_name,
            steps: record.steps,
            status: record.status,
            created_at: record.created_at,
            completed_at: record.completed_at,
        })
    }
}

/// Disjoint mutable borrows of a flow, used while a step runs
pub(crate) struct FlowParts<'a> {
    pub(crate) id: &'a FlowId,
    pub(crate) source: &'a SourceConfiguration,
    pub(crate) target: &'a mut TargetConfiguration,
    pub(crate) requested_name: &'a str,
    pub(crate) steps: &'a mut [MigrationStep],
}

/// Progress notification for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub flow_id: FlowId,
    pub step: StepKind,
    pub status: StepStatus,
    pub progress: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow() -> MigrationFlow {
        let source = Arc::new(SourceConfiguration::new("bot-1", "Helpdesk").unwrap());
        let target = TargetConfiguration::draft("agent-1", "Helper", "bot-1", Utc::now());
        MigrationFlow::new(
            FlowId("flow-1".to_string()),
            source,
            target,
            "Helper".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn plan_order_matches_index() {
        for (i, kind) in StepKind::PLAN.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn step_lifecycle() {
        let mut step = MigrationStep::pending(StepKind::Deploy);
        assert!(!step.advance_progress(10));

        step.begin(Utc::now()).unwrap();
        assert!(step.advance_progress(40));
        assert!(!step.advance_progress(30));
        assert!(step.advance_progress(250));
        assert_eq!(step.progress(), 99);

        step.complete("done".to_string(), Utc::now()).unwrap();
        assert_eq!(step.progress(), 100);
        assert_eq!(step.status(), StepStatus::Completed);
        assert!(!step.advance_progress(50));
        assert_eq!(step.progress(), 100);
    }

    #[test]
    fn step_cannot_regress() {
        let mut step = MigrationStep::pending(StepKind::RunTests);
        step.begin(Utc::now()).unwrap();
        step.fail("boom".to_string(), Utc::now()).unwrap();

        assert_eq!(step.error(), Some("boom"));
        assert!(step.begin(Utc::now()).is_err());
        assert!(step.complete("late".to_string(), Utc::now()).is_err());
        assert_eq!(step.status(), StepStatus::Error);
    }

    #[test]
    fn fresh_flow() {
        let flow = flow();
        assert!(flow.is_fresh());
        assert_eq!(flow.steps().len(), 7);
        assert_eq!(flow.progress_percent(), 0);
        assert!(flow.current_step().is_none());
        assert_eq!(flow.step(StepKind::RunTests).id(), "run-tests");
    }

    #[test]
    fn flow_status_is_monotonic() {
        let mut flow = flow();
        flow.advance(FlowStatus::Cloning).unwrap();
        assert!(flow.advance(FlowStatus::Initializing).is_err());
        assert!(flow.advance(FlowStatus::Configuring).is_err());
        flow.finish(FlowStatus::Failed, Utc::now()).unwrap();
        assert!(flow.advance(FlowStatus::Converting).is_err());
        assert!(flow.completed_at().is_some());
    }

    #[test]
    fn step_kind_serializes_as_id() {
        for kind in StepKind::PLAN {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
    }

    #[test]
    fn decoded_flow_keeps_the_plan() {
        let flow = flow();
        let json = serde_json::to_value(&flow).unwrap();
        let decoded: MigrationFlow = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, flow);
    }

    #[test]
    fn decoding_rejects_a_broken_plan() {
        let json = serde_json::to_value(flow()).unwrap();

        let mut truncated = json.clone();
        truncated["steps"].as_array_mut().unwrap().truncate(2);
        let err = serde_json::from_value::<MigrationFlow>(truncated).unwrap_err();
        assert!(err.to_string().contains("has 2 steps, expected 7"));

        let mut reversed = json.clone();
        reversed["steps"].as_array_mut().unwrap().reverse();
        let err = serde_json::from_value::<MigrationFlow>(reversed).unwrap_err();
        assert!(err.to_string().contains("step 'deploy' where 'open-source' belongs"));

        let mut overfull = json;
        overfull["steps"][0]["progress"] = serde_json::json!(180);
        assert!(serde_json::from_value::<MigrationFlow>(overfull).is_err());
    }

    #[test]
    fn phases_follow_step_completion() {
        let phases: Vec<_> = StepKind::PLAN.iter().map(StepKind::phase_after).collect();
        assert_eq!(
            phases,
            vec![
                Some(FlowStatus::Cloning),
                Some(FlowStatus::Converting),
                Some(FlowStatus::Configuring),
                Some(FlowStatus::Testing),
                Some(FlowStatus::Deploying),
                None,
                None,
            ]
        );
    }
}
