//! Shift Core
//!
//! Moves a rule-based bot to a conversational agent through a fixed
//! seven-step flow:
//!
//! 1. Open the source bot
//! 2. Clone and convert its migratable content
//! 3. Name and create the agent
//! 4. Review the migrated content
//! 5. Reconfigure settings
//! 6. Run the test battery
//! 7. Deploy
//!
//! Steps run strictly in order. While a step's action is suspended its
//! progress is animated by a ticker that stops the instant the action
//! settles. The first failing step stops the flow; completed steps are not
//! rolled back.
//!
//! # Example
//!
//! ```rust,ignore
//! use shift_core::{MigrationOrchestrator, OrchestratorConfig};
//! use std::sync::Arc;
//!
//! let orchestrator = MigrationOrchestrator::new(OrchestratorConfig::default())?;
//! let mut flow = orchestrator.plan(Arc::new(source), "Helpdesk Agent");
//! orchestrator.run(&mut flow).await?;
//! let delta = flow.capability_delta()?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod assessment;
mod config;
mod error;
mod orchestrator;
mod progress;
mod runtime;
pub mod state_machine;
mod steps;
mod store;
mod types;

pub use assessment::{assess, BlockedUnit, MigrationAssessment};
pub use config::{OrchestratorConfig, StepLatency, TestGate};
pub use error::{CollaboratorError, MigrationError, Result, StepFailure, StoreError};
pub use orchestrator::MigrationOrchestrator;
pub use progress::TickerStats;
pub use runtime::{
    Clock, Collaborators, Delay, IdGenerator, NoDelay, RandomSource, SeededRandom, SystemClock,
    TextGenerator, ThreadRandom, TokioDelay, UlidIds,
};
pub use steps::{
    CloneAndConvert, Deploy, NameAndCreate, OpenSource, ReconfigureSettings, ReviewContent,
    RunTests, StepAction, StepContext, StepRegistry, TEST_CHECKS,
};
pub use store::{JsonStore, MemoryStore, Store};
pub use types::{
    FlowId, FlowStatus, MigrationFlow, MigrationStep, ProgressEvent, StepKind, StepStatus,
};

pub use shift_config as model;
pub use shift_delta as delta;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
