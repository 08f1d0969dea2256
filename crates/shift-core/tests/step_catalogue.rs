//! Built-in step actions driven directly, outside an orchestrator

use pretty_assertions::assert_eq;
use shift_config::{AgentStatus, TargetConfiguration};
use shift_core::{
    Collaborators, FlowId, OrchestratorConfig, ProgressEvent, RunTests, StepAction, StepContext,
    StepKind, StepStatus,
};
use shift_test_utils::{
    fast_config, sample_source, test_orchestrator, ScriptedRandom, SlowNarrator, SteppingClock,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn run_tests_counts_scripted_outcomes() {
    let source = sample_source();
    let clock = SteppingClock::new(1);
    let mut target = TargetConfiguration::draft("agent-1", "Helper", &source.id, clock.start());
    let config = OrchestratorConfig::default();
    let collaborators = Collaborators {
        random: Arc::new(ScriptedRandom::new([0.1, 0.95, 0.1, 0.1, 0.97, 0.1], 0.0)),
        ..Collaborators::default()
    };
    let flow_id = FlowId("flow-1".to_string());

    let mut ctx = StepContext {
        flow_id: &flow_id,
        kind: StepKind::RunTests,
        source: &source,
        target: &mut target,
        requested_name: "Helper",
        config: &config,
        collaborators: &collaborators,
    };
    let details = RunTests.execute(&mut ctx).await.unwrap();

    assert_eq!(
        details,
        "4/6 checks passed; failed: entity recognition, authorization security"
    );
    assert_eq!(target.status, AgentStatus::Testing);
}

#[tokio::test(start_paused = true)]
async fn slow_summary_keeps_the_step_ticking() {
    let orchestrator = test_orchestrator(fast_config()).with_narrator(Arc::new(SlowNarrator {
        latency: Duration::from_secs(2),
        text: "Everything important made it across.".to_string(),
    }));
    let mut rx = orchestrator.subscribe();
    let mut flow = orchestrator.plan(Arc::new(sample_source()), "Helpdesk Agent");
    orchestrator.run(&mut flow).await.unwrap();

    let review = flow.step(StepKind::ReviewContent);
    assert!(review
        .details()
        .ends_with("Everything important made it across."));

    let mut peak = 0;
    while let Ok(ProgressEvent {
        step,
        status,
        progress,
        ..
    }) = rx.try_recv()
    {
        if step == StepKind::ReviewContent && status == StepStatus::InProgress {
            peak = peak.max(progress);
        }
    }
    // 3 s of work at 5 points per 200 ms tick
    assert_eq!(peak, 70);
}
