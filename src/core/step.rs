//! Step domain model

use crate::core::state::StepPhase;
use std::time::Duration;

/// A single declared action in a tick-driven sequence
///
/// Static metadata is fixed at construction; the runtime flags are the
/// only fields that change while the sequence is advancing.
#[derive(Debug, Clone)]
pub struct Step {
    /// Position in the sequence, equal to insertion order
    pub index: usize,

    /// Descriptor id when built from a config, used in log output
    pub name: Option<String>,

    /// If true, this step does not gate the steps declared after it
    pub asynchronous: bool,

    /// Index of the predecessor whose completion unlocks this step
    /// (`None` = eligible immediately). Always less than `index`.
    pub start_condition: Option<usize>,

    /// Step was constructed under a barrier request and is gated on the
    /// completion frontier instead of the current event
    pub must_finish: bool,

    /// Asynchronous step whose gate was inherited from a barrier step;
    /// gated on the completion frontier like the barrier itself
    pub inherits_barrier: bool,

    /// Step may be skipped or closed out by the per-call override
    pub optional: bool,

    /// Minimum time the step must sit eligible before it may start
    pub delay: Option<Duration>,

    /// Runtime: the caller has been told to drive this action
    pub started: bool,

    /// Runtime: the completion predicate (or a force-close) has fired.
    /// `done` implies `started`.
    pub done: bool,

    /// Runtime: last instant the step was seen waiting on its gate
    pub ready_time: Duration,
}

impl Step {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        index: usize,
        name: Option<String>,
        asynchronous: bool,
        start_condition: Option<usize>,
        must_finish: bool,
        inherits_barrier: bool,
        optional: bool,
        delay: Option<Duration>,
        now: Duration,
    ) -> Self {
        Self {
            index,
            name,
            asynchronous,
            start_condition,
            must_finish,
            inherits_barrier,
            optional,
            delay,
            started: false,
            done: false,
            ready_time: now,
        }
    }

    /// Whether readiness is referenced against the completion frontier
    /// rather than the current event
    pub fn barrier_gated(&self) -> bool {
        self.must_finish || self.inherits_barrier
    }

    /// Whether `reference` has reached or passed this step's gate
    ///
    /// A `None` gate is always reached; a `None` reference (nothing
    /// completed yet) reaches only gateless steps.
    pub fn gate_reached(&self, reference: Option<usize>) -> bool {
        match self.start_condition {
            None => true,
            Some(gate) => reference.is_some_and(|r| r >= gate),
        }
    }

    /// Per-tick readiness of this step
    ///
    /// A done step is never ready again. A started step stays live until
    /// its completion is observed, regardless of gate or condition. An
    /// unstarted step is ready once its gate is reached, the caller's
    /// extra condition holds, and any delay has elapsed since the step
    /// became eligible.
    pub fn is_ready(&self, reference: Option<usize>, extra_condition: bool, now: Duration) -> bool {
        if self.done {
            return false;
        }
        if self.started {
            return true;
        }
        self.gate_reached(reference) && extra_condition && self.delay_elapsed(now)
    }

    fn delay_elapsed(&self, now: Duration) -> bool {
        match self.delay {
            None => true,
            Some(delay) => now.saturating_sub(self.ready_time) > delay,
        }
    }

    /// Lifecycle phase derived from the runtime flags
    pub fn phase(&self) -> StepPhase {
        if self.done {
            StepPhase::Done
        } else if self.started {
            StepPhase::Active
        } else {
            StepPhase::Pending
        }
    }
}
