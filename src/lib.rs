//! tickflow - a tick-driven action sequencer for non-blocking control loops

pub mod core;
pub mod rules;

// Re-export commonly used types
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::config::{SequenceConfig, StepConfig};
pub use crate::core::{SequenceStatus, Sequencer, SequencerError, Step, StepPhase};
pub use crate::rules::{RuleError, RuleGraph};
