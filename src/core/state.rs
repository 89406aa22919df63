//! Runtime status snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle phase of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPhase {
    /// Not yet told the caller to drive the action
    Pending,
    /// Live: the caller should keep driving the action
    Active,
    /// Completion observed (or force-closed); never live again
    Done,
}

/// Point-in-time snapshot of sequencer progress
///
/// Cheap to capture every tick; intended for telemetry dumps and match
/// logs rather than for driving control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceStatus {
    /// Identity of this sequencer run (regenerated by reset)
    pub run_id: Uuid,

    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,

    /// Number of constructed steps
    pub total_steps: usize,

    /// Steps whose completion has been observed
    pub completed_steps: usize,

    /// Steps currently live
    pub active_steps: usize,

    /// Highest index with an observed synchronous completion
    pub current_event: Option<usize>,

    /// Highest index reachable from 0 over done-or-optional steps
    pub completion_frontier: usize,

    /// Whether the whole pipeline is satisfied
    pub fulfilled: bool,

    /// Whether the sequence is still on its construction tick
    pub recording: bool,
}

impl SequenceStatus {
    /// Fraction of steps completed (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}
