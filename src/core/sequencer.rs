//! Tick-driven sequencer
//!
//! Records an ordered pipeline of steps on its first tick, then replays
//! it every later tick, deciding per call which step is live. Nothing
//! here blocks: every operation returns within the calling tick.

use crate::core::clock::{Clock, SystemClock};
use crate::core::state::{SequenceStatus, StepPhase};
use crate::core::step::Step;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors surfaced by the position-checked advancement API
///
/// The positional `poll` surface never returns these; it degrades to
/// logged no-ops instead. `advance` turns the call-order contract into
/// a checkable precondition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencerError {
    /// Advancement was attempted while the sequence is still recording
    #[error("sequence is still recording; call finish_construction() first")]
    StillRecording,

    /// The sequence has no steps
    #[error("sequence is empty")]
    Empty,

    /// A call referenced a step beyond the constructed pipeline
    #[error("step index {index} is out of range ({len} steps constructed)")]
    StepOutOfRange { index: usize, len: usize },

    /// Calls arrived in a different order than the constructed pipeline
    #[error("advancement call out of order: expected step {expected}, got step {got}")]
    CallOutOfOrder { expected: usize, got: usize },
}

/// Tick-driven action sequencer
///
/// The caller issues one call per declared action, in a fixed order,
/// every tick. The first tick records the pipeline; every later tick
/// replays it by call position. Each call returns a liveness flag: keep
/// driving that action's output this tick, or not.
///
/// The positional protocol requires exactly the same number of calls in
/// the same order on every tick after construction. Callers that want
/// that contract enforced instead of assumed should build from a
/// [`SequenceConfig`](crate::core::config::SequenceConfig) and use
/// [`advance`](Sequencer::advance), which rejects out-of-range and
/// out-of-order calls.
pub struct Sequencer<C: Clock = SystemClock> {
    steps: Vec<Step>,
    first_loop: bool,
    cursor: usize,
    current_event: Option<usize>,
    completion_frontier: usize,
    pending_delay: Option<Duration>,
    pending_barrier: Option<usize>,
    run_id: Uuid,
    clock: C,
}

impl Sequencer<SystemClock> {
    /// Create a sequencer driven by the system clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock::new())
    }
}

impl Default for Sequencer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Sequencer<C> {
    /// Create a sequencer driven by the given clock
    pub fn with_clock(clock: C) -> Self {
        Self {
            steps: Vec::new(),
            first_loop: true,
            cursor: 0,
            current_event: None,
            completion_frontier: 0,
            pending_delay: None,
            pending_barrier: None,
            run_id: Uuid::new_v4(),
            clock,
        }
    }

    // --- positional record/replay surface ---

    /// Record (first tick) or advance (later ticks) one step
    ///
    /// `asynchronous` is only consulted while recording; afterwards the
    /// step's topology is fixed. `done_condition` is the caller's
    /// completion predicate for this step, evaluated this tick. Returns
    /// whether the caller should drive the action's output this tick.
    pub fn poll(&mut self, asynchronous: bool, done_condition: bool) -> bool {
        self.poll_with(asynchronous, done_condition, true, false)
    }

    /// Same as [`poll`](Sequencer::poll), but the step waits `delay`
    /// after becoming eligible before it may start
    ///
    /// The delay binds to the step at construction; on later ticks it is
    /// already part of the step's readiness and the argument is ignored.
    pub fn poll_after(
        &mut self,
        asynchronous: bool,
        done_condition: bool,
        delay: Duration,
    ) -> bool {
        if self.first_loop && self.pending_delay.is_none() {
            self.pending_delay = Some(delay);
        }
        self.poll_with(asynchronous, done_condition, true, false)
    }

    /// Same as [`poll`](Sequencer::poll), but the step also requires
    /// `extra_condition` (e.g. a sensor threshold) to start
    pub fn poll_when(
        &mut self,
        asynchronous: bool,
        done_condition: bool,
        extra_condition: bool,
    ) -> bool {
        self.poll_with(asynchronous, done_condition, extra_condition, false)
    }

    /// Same as [`poll`](Sequencer::poll), for a step that may be skipped
    ///
    /// Construct with `optional = true`. On later ticks, passing `false`
    /// while the step is eligible closes it out instead of starting it.
    pub fn poll_optional(
        &mut self,
        asynchronous: bool,
        done_condition: bool,
        optional: bool,
    ) -> bool {
        self.poll_with(asynchronous, done_condition, true, optional)
    }

    /// Explicit four-argument form of [`poll`](Sequencer::poll)
    pub fn poll_with(
        &mut self,
        asynchronous: bool,
        done_condition: bool,
        extra_condition: bool,
        optional: bool,
    ) -> bool {
        if self.first_loop {
            self.record_step(asynchronous, optional, None);
        }
        if self.steps.is_empty() {
            warn!("poll on an empty sequence; ignoring");
            return false;
        }
        self.advance_cursor(done_condition, optional);
        self.evaluate_cursor(extra_condition, optional)
    }

    /// End the construction tick (idempotent)
    ///
    /// Call once the first tick has issued every construction call;
    /// every later `poll` advances the recorded pipeline instead of
    /// growing it.
    pub fn finish_construction(&mut self) {
        if self.first_loop {
            debug!(steps = self.steps.len(), "sequence construction finished");
        }
        self.first_loop = false;
    }

    /// Whether the sequence is still on its construction tick
    pub fn is_recording(&self) -> bool {
        self.first_loop
    }

    // --- checked advancement surface ---

    /// Advance one step, verifying call position
    ///
    /// Equivalent to [`poll`](Sequencer::poll) for a sealed sequence,
    /// except the step is named by index and the call is rejected if it
    /// is out of range or arrives out of pipeline order.
    pub fn advance(&mut self, index: usize, done_condition: bool) -> Result<bool, SequencerError> {
        self.advance_with(index, done_condition, true, false)
    }

    /// Explicit form of [`advance`](Sequencer::advance) with the extra
    /// readiness condition and the optional override
    pub fn advance_with(
        &mut self,
        index: usize,
        done_condition: bool,
        extra_condition: bool,
        optional: bool,
    ) -> Result<bool, SequencerError> {
        if self.first_loop {
            return Err(SequencerError::StillRecording);
        }
        if self.steps.is_empty() {
            return Err(SequencerError::Empty);
        }
        if index >= self.steps.len() {
            return Err(SequencerError::StepOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        let expected = if self.cursor >= self.steps.len() - 1 {
            0
        } else {
            self.cursor + 1
        };
        if index != expected {
            return Err(SequencerError::CallOutOfOrder {
                expected,
                got: index,
            });
        }
        self.advance_cursor(done_condition, optional);
        Ok(self.evaluate_cursor(extra_condition, optional))
    }

    // --- control operations ---

    /// Force-close the next pending synchronous step
    ///
    /// Used when an external signal, not the per-call predicate, should
    /// end the in-flight blocking step immediately.
    pub fn done(&mut self) {
        let from = self.next_event_index();
        let target = (from..self.steps.len()).find(|&i| !self.steps[i].asynchronous);
        if let Some(index) = target {
            self.steps[index].started = true;
            self.steps[index].done = true;
            self.recompute_frontier();
            self.current_event = Some(index);
            debug!(
                step = index,
                frontier = self.completion_frontier,
                "force-closed step"
            );
        }
    }

    /// Queue a one-shot delay for the next constructed step
    pub fn add_delay(&mut self, delay: Duration) {
        if !self.first_loop {
            warn!("add_delay after construction; ignoring");
            return;
        }
        self.pending_delay = Some(delay);
    }

    /// Gate the next constructed step on the whole pipeline built so far
    ///
    /// One-shot, construction tick only. The constructed step waits for
    /// the completion frontier to reach the latest recorded index.
    pub fn wait_for_finish(&mut self) {
        if self.steps.is_empty() {
            warn!("wait_for_finish on an empty sequence; ignoring");
            return;
        }
        self.wait_for_finish_at(self.steps.len() - 1);
    }

    /// Gate the next constructed step on the frontier reaching `target`
    pub fn wait_for_finish_at(&mut self, target: usize) {
        if !self.first_loop {
            warn!("wait_for_finish after construction; ignoring");
            return;
        }
        self.pending_barrier = Some(target);
    }

    /// Rewind perceived progress to the cursor step
    ///
    /// Clears `started`/`done` for the cursor step and everything after
    /// it, and rolls the current event back to the cursor step's gate.
    /// Step metadata is untouched.
    pub fn set_to_now(&mut self) {
        if self.steps.is_empty() {
            warn!("set_to_now on an empty sequence; ignoring");
            return;
        }
        for step in &mut self.steps[self.cursor..] {
            step.started = false;
            step.done = false;
        }
        self.current_event = self.steps[self.cursor].start_condition;
        debug!(
            cursor = self.cursor,
            current_event = ?self.current_event,
            "rewound sequence"
        );
    }

    /// Drop all steps and return to the initial recording state
    pub fn reset(&mut self) {
        self.steps.clear();
        self.first_loop = true;
        self.cursor = 0;
        self.current_event = None;
        self.completion_frontier = 0;
        self.pending_delay = None;
        self.pending_barrier = None;
        self.run_id = Uuid::new_v4();
        debug!("sequence reset");
    }

    // --- queries ---

    /// Whether every step in the pipeline has been satisfied
    pub fn is_fulfilled(&self) -> bool {
        !self.steps.is_empty() && self.current_event == Some(self.steps.len() - 1)
    }

    /// Number of constructed steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The constructed steps in pipeline order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// A single step by index
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Index of a named step, when built from descriptors
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.name.as_deref() == Some(name))
    }

    /// Highest index with an observed synchronous completion
    pub fn current_event(&self) -> Option<usize> {
        self.current_event
    }

    /// Highest index reachable from 0 over done-or-optional steps
    pub fn completion_frontier(&self) -> usize {
        self.completion_frontier
    }

    /// Capture a telemetry snapshot of the sequence
    pub fn status(&self) -> SequenceStatus {
        let completed = self
            .steps
            .iter()
            .filter(|s| s.phase() == StepPhase::Done)
            .count();
        let active = self
            .steps
            .iter()
            .filter(|s| s.phase() == StepPhase::Active)
            .count();
        SequenceStatus {
            run_id: self.run_id,
            captured_at: chrono::Utc::now(),
            total_steps: self.steps.len(),
            completed_steps: completed,
            active_steps: active,
            current_event: self.current_event,
            completion_frontier: self.completion_frontier,
            fulfilled: self.is_fulfilled(),
            recording: self.first_loop,
        }
    }

    // --- construction internals ---

    /// Append a step, deriving its gate by backward scan
    fn record_step(&mut self, asynchronous: bool, optional: bool, name: Option<String>) {
        let index = self.steps.len();
        let (start_condition, must_finish, inherits_barrier) = match self.pending_barrier.take() {
            Some(target) if target < index => (Some(target), true, false),
            Some(target) => {
                warn!(requested = target, index, "barrier target not behind step; ignoring");
                let (gate, inherits) = self.derive_gate(index, asynchronous);
                (gate, false, inherits)
            }
            None => {
                let (gate, inherits) = self.derive_gate(index, asynchronous);
                (gate, false, inherits)
            }
        };
        let delay = self.pending_delay.take();
        debug!(
            index,
            asynchronous,
            start_condition = ?start_condition,
            must_finish,
            "recorded step"
        );
        self.steps.push(Step::new(
            index,
            name,
            asynchronous,
            start_condition,
            must_finish,
            inherits_barrier,
            optional,
            delay,
            self.clock.now(),
        ));
    }

    /// Backward scan for the gate of a step inserted at `upto`
    ///
    /// Stops at the first synchronous or barrier predecessor. A
    /// synchronous step gates on the stop itself; an asynchronous step
    /// inherits the stop's own gate (runs of asynchronous steps converge
    /// on one gate) and whether the stop was a barrier. No stop means no
    /// gate.
    fn derive_gate(&self, upto: usize, asynchronous: bool) -> (Option<usize>, bool) {
        for i in (0..upto).rev() {
            let stop = &self.steps[i];
            if !stop.asynchronous || stop.must_finish {
                if asynchronous {
                    return (stop.start_condition, stop.must_finish);
                }
                return (Some(i), false);
            }
        }
        (None, false)
    }

    // --- advancement internals ---

    /// Move the cursor one step (wrapping) and absorb the completion
    /// predicate for the step it lands on
    fn advance_cursor(&mut self, done_condition: bool, optional: bool) {
        if self.cursor >= self.steps.len().saturating_sub(1) {
            self.cursor = 0;
        } else {
            self.cursor += 1;
        }
        if self.first_loop {
            return;
        }
        let cursor = self.cursor;

        let completed = {
            let step = &mut self.steps[cursor];
            if step.started && !step.done {
                step.done = done_condition;
                done_condition
            } else {
                false
            }
        };
        if completed {
            self.recompute_frontier();
            debug!(
                step = cursor,
                frontier = self.completion_frontier,
                "step completed"
            );
            if self.past_current_event(cursor) && !self.steps[cursor].asynchronous {
                self.current_event = Some(cursor);
                debug!(current_event = cursor, "advanced current event");
            }
        }

        // An optional step sitting just past the current event, invoked
        // this tick as non-optional, is promoted without a completion.
        if self.next_event_index() == cursor && self.steps[cursor].optional && !optional {
            self.recompute_frontier();
            self.current_event = Some(cursor);
            debug!(current_event = cursor, "promoted optional step");
        }
    }

    /// Compute the cursor step's readiness and liveness for this call
    fn evaluate_cursor(&mut self, extra_condition: bool, optional: bool) -> bool {
        let cursor = self.cursor;
        let now = self.clock.now();
        let override_close = self.steps[cursor].optional && !optional;

        let reference = if override_close {
            // Closing out: re-derive the gate as if the step were
            // asynchronous, so it converges on its blocking ancestor.
            let (gate, _) = self.derive_gate(cursor, true);
            self.steps[cursor].start_condition = gate;
            self.current_event
        } else if self.steps[cursor].barrier_gated() {
            Some(self.completion_frontier)
        } else {
            self.current_event
        };

        // Hold the waiting timestamp until the gate opens, so a delay
        // measures time since the step became eligible.
        if !self.steps[cursor].started && !self.steps[cursor].gate_reached(reference) {
            self.steps[cursor].ready_time = now;
        }

        let mut ready = self.steps[cursor].is_ready(reference, extra_condition, now);

        if ready {
            if override_close {
                if self.past_current_event(cursor) {
                    let gate_done = self.steps[cursor]
                        .start_condition
                        .is_none_or(|g| self.steps[g].done);
                    if self.steps[cursor].asynchronous || gate_done {
                        self.current_event = Some(cursor);
                        debug!(current_event = cursor, "closed out optional step");
                    }
                }
                // Closing out, not starting
                ready = false;
            } else {
                self.steps[cursor].started = true;
            }
        }

        ready || (self.steps[cursor].started && !self.steps[cursor].done)
    }

    /// Extend the frontier from 0 over contiguous done-or-optional steps
    fn recompute_frontier(&mut self) {
        for (i, step) in self.steps.iter().enumerate() {
            if step.done {
                self.completion_frontier = i;
            } else if step.optional {
                if self.completion_frontier < i {
                    self.completion_frontier = i;
                }
            } else {
                break;
            }
        }
    }

    fn past_current_event(&self, index: usize) -> bool {
        self.current_event.is_none_or(|e| index > e)
    }

    /// Index just past the current event (0 when nothing has completed)
    fn next_event_index(&self) -> usize {
        self.current_event.map_or(0, |e| e + 1)
    }

    /// Record a descriptor-driven step (two-phase construction)
    pub(crate) fn record_descriptor(
        &mut self,
        name: Option<String>,
        asynchronous: bool,
        optional: bool,
        delay: Option<Duration>,
        barrier_target: Option<usize>,
    ) {
        if let Some(target) = barrier_target {
            self.wait_for_finish_at(target);
        }
        if let Some(delay) = delay {
            self.add_delay(delay);
        }
        self.record_step(asynchronous, optional, name);
        // Keep the cursor where a construction call would leave it, so
        // the first advancement expects step 0.
        self.cursor = self.steps.len() - 1;
    }
}
