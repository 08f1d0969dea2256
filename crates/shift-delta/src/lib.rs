//! Shift Capability Delta
//!
//! Computes what a migrated agent gained and lost relative to its source bot.
//!
//! # Example
//!
//! ```rust,ignore
//! use shift_delta::CapabilityDeltaEngine;
//!
//! let delta = CapabilityDeltaEngine::new().diff(&source, &target)?;
//! for key in &delta.added {
//!     println!("new: {key}");
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod delta;

pub use delta::{
    diff, CapabilityDelta, CapabilityDeltaEngine, CapabilityKey, DeltaError, KindSummary, Side,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
