//! Core domain models for tickflow
//!
//! This module defines the sequencer itself plus the step records,
//! clocks, descriptors, and status types it is built from.

pub mod clock;
pub mod config;
pub mod sequencer;
pub mod state;
pub mod step;

pub use sequencer::*;
pub use state::*;
pub use step::*;
