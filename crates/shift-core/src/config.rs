//! Orchestrator configuration
//!
//! Loadable from TOML; every key is optional and falls back to the demo
//! pacing defaults.

use crate::error::{MigrationError, Result};
use crate::types::StepKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy applied to the run-tests battery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestGate {
    /// Fail the step only when every check fails
    #[default]
    RequireAnyPass,
    /// Never fail the step; results are informational
    Advisory,
}

/// Simulated latency per step, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepLatency {
    pub open_source: u64,
    pub clone_and_convert: u64,
    pub name_and_create: u64,
    pub review_content: u64,
    pub reconfigure_settings: u64,
    pub run_tests: u64,
    pub deploy: u64,
}

impl StepLatency {
    /// Same latency for every step
    #[must_use]
    pub fn uniform(millis: u64) -> Self {
        Self {
            open_source: millis,
            clone_and_convert: millis,
            name_and_create: millis,
            review_content: millis,
            reconfigure_settings: millis,
            run_tests: millis,
            deploy: millis,
        }
    }

    /// Latency for one step
    #[must_use]
    pub fn for_step(&self, kind: StepKind) -> Duration {
        let millis = match kind {
            StepKind::OpenSource => self.open_source,
            StepKind::CloneAndConvert => self.clone_and_convert,
            StepKind::NameAndCreate => self.name_and_create,
            StepKind::ReviewContent => self.review_content,
            StepKind::ReconfigureSettings => self.reconfigure_settings,
            StepKind::RunTests => self.run_tests,
            StepKind::Deploy => self.deploy,
        };
        Duration::from_millis(millis)
    }

    /// Sum over all steps
    #[must_use]
    pub fn total(&self) -> Duration {
        StepKind::PLAN.iter().map(|k| self.for_step(*k)).sum()
    }
}

impl Default for StepLatency {
    fn default() -> Self {
        Self {
            open_source: 1000,
            clone_and_convert: 2000,
            name_and_create: 1500,
            review_content: 1200,
            reconfigure_settings: 1800,
            run_tests: 2500,
            deploy: 2000,
        }
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Simulated work per step
    pub step_latency: StepLatency,
    /// Interval between progress ticks, in milliseconds
    pub tick_interval_ms: u64,
    /// Smallest progress increment per tick
    pub tick_min_increment: u8,
    /// Largest progress increment per tick
    pub tick_max_increment: u8,
    /// In-progress percentage is never raised past this
    pub progress_ceiling: u8,
    /// Probability that each test check passes
    pub check_pass_probability: f64,
    /// Run-tests step policy
    pub test_gate: TestGate,
    /// Deployment locators are `{base}/{agent id}`
    pub deployment_base_url: String,
    /// Capabilities every created agent declares
    pub agent_capabilities: Vec<String>,
}

impl OrchestratorConfig {
    /// Parse from a TOML document
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|e| MigrationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MigrationError::Config(e.to_string()))
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`MigrationError::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.check_pass_probability) {
            return Err(MigrationError::Config(format!(
                "check_pass_probability must be within [0, 1], got {}",
                self.check_pass_probability
            )));
        }
        if self.progress_ceiling >= 100 {
            return Err(MigrationError::Config(format!(
                "progress_ceiling must be below 100, got {}",
                self.progress_ceiling
            )));
        }
        if self.tick_min_increment > self.tick_max_increment {
            return Err(MigrationError::Config(format!(
                "tick_min_increment {} exceeds tick_max_increment {}",
                self.tick_min_increment, self.tick_max_increment
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(MigrationError::Config(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Tick interval as a duration
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// With step latency
    #[inline]
    #[must_use]
    pub fn with_step_latency(mut self, latency: StepLatency) -> Self {
        self.step_latency = latency;
        self
    }

    /// With tick interval
    #[inline]
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With tick increment bounds
    #[inline]
    #[must_use]
    pub fn with_tick_increments(mut self, min: u8, max: u8) -> Self {
        self.tick_min_increment = min;
        self.tick_max_increment = max;
        self
    }

    /// With progress ceiling
    #[inline]
    #[must_use]
    pub fn with_progress_ceiling(mut self, ceiling: u8) -> Self {
        self.progress_ceiling = ceiling;
        self
    }

    /// With check pass probability
    #[inline]
    #[must_use]
    pub fn with_check_pass_probability(mut self, probability: f64) -> Self {
        self.check_pass_probability = probability;
        self
    }

    /// With test gate policy
    #[inline]
    #[must_use]
    pub fn with_test_gate(mut self, gate: TestGate) -> Self {
        self.test_gate = gate;
        self
    }

    /// With deployment base URL
    #[inline]
    #[must_use]
    pub fn with_deployment_base_url(mut self, url: impl Into<String>) -> Self {
        self.deployment_base_url = url.into();
        self
    }

    /// With declared agent capabilities
    #[must_use]
    pub fn with_agent_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            step_latency: StepLatency::default(),
            tick_interval_ms: 200,
            tick_min_increment: 5,
            tick_max_increment: 15,
            progress_ceiling: 95,
            check_pass_probability: 0.9,
            test_gate: TestGate::RequireAnyPass,
            deployment_base_url: "https://agents.example.com".to_string(),
            agent_capabilities: vec![
                "generative answers".to_string(),
                "knowledge sources".to_string(),
                "natural language understanding".to_string(),
                "multi-turn context".to_string(),
                "plugin actions".to_string(),
            ],
        }
    }
}
