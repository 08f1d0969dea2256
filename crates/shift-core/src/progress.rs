//! Simulated progress for in-flight steps
//!
//! A [`ProgressTicker`] raises a step's percentage in randomized increments
//! while the step's action is suspended. Ticking stops the moment the action
//! settles: the tick loop and the action are raced inside one future, so when
//! the action finishes the loop is dropped with it and can no longer touch
//! the step.
//!
//! # Invariants
//! - In-progress percentage never exceeds the ceiling (always below 100)
//! - Every started ticker is counted as stopped exactly once, on drop

use crate::runtime::{Delay, RandomSource};
use crate::types::{FlowId, MigrationStep, ProgressEvent, StepStatus};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Snapshot of ticker accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickerStats {
    pub started: u64,
    pub stopped: u64,
}

impl TickerStats {
    /// Tickers started but not yet stopped
    #[inline]
    #[must_use]
    pub fn running(&self) -> u64 {
        self.started.saturating_sub(self.stopped)
    }
}

/// Shared counters behind [`TickerStats`]
#[derive(Debug, Default)]
pub(crate) struct TickerLedger {
    started: AtomicU64,
    stopped: AtomicU64,
}

impl TickerLedger {
    pub(crate) fn snapshot(&self) -> TickerStats {
        TickerStats {
            started: self.started.load(Ordering::SeqCst),
            stopped: self.stopped.load(Ordering::SeqCst),
        }
    }
}

/// Tick pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickPolicy {
    pub(crate) interval: Duration,
    pub(crate) min_increment: u8,
    pub(crate) max_increment: u8,
    pub(crate) ceiling: u8,
}

impl TickPolicy {
    /// Next percentage after one tick, never above the ceiling
    pub(crate) fn next(&self, current: u8, random: &dyn RandomSource) -> u8 {
        let increment = random.next_in_range(self.min_increment, self.max_increment);
        current.saturating_add(increment).min(self.ceiling.min(99))
    }
}

/// Progress animator for one step execution
pub(crate) struct ProgressTicker {
    flow_id: FlowId,
    policy: TickPolicy,
    delay: Arc<dyn Delay>,
    random: Arc<dyn RandomSource>,
    events: broadcast::Sender<ProgressEvent>,
    ledger: Arc<TickerLedger>,
}

impl ProgressTicker {
    /// Start a ticker; counted as started immediately
    pub(crate) fn start(
        flow_id: FlowId,
        policy: TickPolicy,
        delay: Arc<dyn Delay>,
        random: Arc<dyn RandomSource>,
        events: broadcast::Sender<ProgressEvent>,
        ledger: Arc<TickerLedger>,
    ) -> Self {
        ledger.started.fetch_add(1, Ordering::SeqCst);
        Self {
            flow_id,
            policy,
            delay,
            random,
            events,
            ledger,
        }
    }

    /// Run `work` to completion while ticking `step`
    ///
    /// Consumes the ticker, so it is stopped whichever way `work` settles.
    pub(crate) async fn drive<F>(self, step: &mut MigrationStep, work: F) -> F::Output
    where
        F: Future,
    {
        let ticking = self.tick_loop(step);
        tokio::pin!(work);
        tokio::pin!(ticking);
        tokio::select! {
            biased;
            output = &mut work => output,
            never = &mut ticking => match never {},
        }
    }

    async fn tick_loop(&self, step: &mut MigrationStep) -> Infallible {
        loop {
            if step.progress() >= self.policy.ceiling {
                return std::future::pending::<Infallible>().await;
            }
            self.delay.sleep(self.policy.interval).await;

            let next = self.policy.next(step.progress(), self.random.as_ref());
            if step.advance_progress(next) {
                // No receivers is not an error
                let _ = self.events.send(ProgressEvent {
                    flow_id: self.flow_id.clone(),
                    step: step.kind(),
                    status: StepStatus::InProgress,
                    progress: step.progress(),
                });
            }
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.ledger.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{NoDelay, TokioDelay};
    use crate::types::StepKind;
    use chrono::Utc;

    struct Fixed(f64);

    impl RandomSource for Fixed {
        fn next_f64(&self) -> f64 {
            self.0
        }
    }

    fn policy() -> TickPolicy {
        TickPolicy {
            interval: Duration::from_millis(200),
            min_increment: 5,
            max_increment: 15,
            ceiling: 95,
        }
    }

    fn ticker(
        delay: Arc<dyn Delay>,
        ledger: &Arc<TickerLedger>,
    ) -> (ProgressTicker, broadcast::Receiver<ProgressEvent>) {
        let (tx, rx) = broadcast::channel(256);
        let ticker = ProgressTicker::start(
            FlowId("flow-1".to_string()),
            policy(),
            delay,
            Arc::new(Fixed(0.0)),
            tx,
            Arc::clone(ledger),
        );
        (ticker, rx)
    }

    fn in_progress_step() -> MigrationStep {
        let mut step = MigrationStep::pending(StepKind::CloneAndConvert);
        step.begin(Utc::now()).unwrap();
        step
    }

    #[test]
    fn policy_respects_ceiling() {
        let policy = policy();
        assert_eq!(policy.next(0, &Fixed(0.0)), 5);
        assert_eq!(policy.next(90, &Fixed(0.99)), 95);
        assert_eq!(policy.next(95, &Fixed(0.99)), 95);

        let reckless = TickPolicy {
            ceiling: 250,
            ..policy
        };
        assert_eq!(reckless.next(98, &Fixed(0.99)), 99);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_while_work_is_pending() {
        let ledger = Arc::new(TickerLedger::default());
        let (ticker, mut rx) = ticker(Arc::new(TokioDelay), &ledger);
        let mut step = in_progress_step();

        let out = ticker
            .drive(&mut step, async {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                "done"
            })
            .await;

        assert_eq!(out, "done");
        // Ticks at 200, 400, 600 and 800 ms; the 1000 ms tick loses to the work
        assert_eq!(step.progress(), 20);
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.progress);
        }
        assert_eq!(seen, vec![5, 10, 15, 20]);
        assert_eq!(ledger.snapshot(), TickerStats { started: 1, stopped: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_ceiling() {
        let ledger = Arc::new(TickerLedger::default());
        let (ticker, _rx) = ticker(Arc::new(TokioDelay), &ledger);
        let mut step = in_progress_step();

        ticker
            .drive(&mut step, tokio::time::sleep(Duration::from_secs(60)))
            .await;

        assert_eq!(step.progress(), 95);
        assert_eq!(step.status(), StepStatus::InProgress);
        assert_eq!(ledger.snapshot().running(), 0);
    }

    #[tokio::test]
    async fn stopped_when_dropped_undriven() {
        let ledger = Arc::new(TickerLedger::default());
        let (ticker, _rx) = ticker(Arc::new(NoDelay), &ledger);
        assert_eq!(ledger.snapshot().running(), 1);
        drop(ticker);
        assert_eq!(ledger.snapshot(), TickerStats { started: 1, stopped: 1 });
    }
}
