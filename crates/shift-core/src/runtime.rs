//! Injected collaborators
//!
//! Everything nondeterministic or slow that the orchestrator touches goes
//! through one of these traits, so tests can pin ids, time, latency and
//! randomness:
//! - [`IdGenerator`] for flow and agent identifiers
//! - [`Clock`] for timestamps
//! - [`Delay`] for simulated latency and progress ticking
//! - [`RandomSource`] for tick increments and test-check outcomes
//! - [`TextGenerator`] for the optional review summary

use crate::error::{CollaboratorError, MigrationError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

/// Produces opaque unique identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// ULID identifiers, sortable by creation time
#[derive(Debug, Clone, Copy, Default)]
pub struct UlidIds;

impl IdGenerator for UlidIds {
    fn next_id(&self) -> String {
        Ulid::new().to_string()
    }
}

/// Produces current timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Suspends the current task
#[async_trait::async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Timer-backed delay; honours paused tokio time in tests
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

#[async_trait::async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Ignores the duration and only yields to the scheduler
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait::async_trait]
impl Delay for NoDelay {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

/// Uniform random floats in `[0, 1)`
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;

    /// Uniform integer in `[min, max]`
    fn next_in_range(&self, min: u8, max: u8) -> u8 {
        if min >= max {
            return min;
        }
        let span = f64::from(max - min) + 1.0;
        let offset = (self.next_f64().clamp(0.0, 1.0) * span).floor();
        // offset is in [0, span]; the clamp folds a 1.0 sample onto max
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = offset as u8;
        min.saturating_add(offset).min(max)
    }
}

/// Thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Reproducible generator seeded from a u64
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl fmt::Debug for SeededRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededRandom").finish_non_exhaustive()
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        self.rng.lock().random::<f64>()
    }
}

/// Best-effort natural-language generation
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] if the provider cannot answer.
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError>;
}

/// The full set of injected collaborators
#[derive(Clone)]
pub struct Collaborators {
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
    pub delay: Arc<dyn Delay>,
    pub random: Arc<dyn RandomSource>,
    pub narrator: Option<Arc<dyn TextGenerator>>,
}

impl Collaborators {
    /// Generate text, mapping absence to [`CollaboratorError::NotConfigured`]
    ///
    /// # Errors
    /// Returns [`MigrationError::CollaboratorUnavailable`] when no usable text
    /// comes back; callers downgrade it to a fallback.
    pub async fn narrate(&self, prompt: &str) -> Result<String, MigrationError> {
        let narrator = self
            .narrator
            .as_ref()
            .ok_or(CollaboratorError::NotConfigured)?;
        let text = narrator.generate(prompt).await?;
        if text.trim().is_empty() {
            return Err(CollaboratorError::EmptyResponse.into());
        }
        Ok(text)
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            ids: Arc::new(UlidIds),
            clock: Arc::new(SystemClock),
            delay: Arc::new(TokioDelay),
            random: Arc::new(ThreadRandom),
            narrator: None,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("narrator", &self.narrator.is_some())
            .finish_non_exhaustive()
    }
}
