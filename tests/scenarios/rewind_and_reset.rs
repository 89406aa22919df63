//! Rewind, force-close, and reset-reuse behavior

use crate::helpers::*;
use tickflow::StepPhase;

/// `done()` closes the next blocking step without its predicate firing
#[test]
fn test_force_close_advances_the_chain() {
    let (mut seq, _) = sync_chain(3);

    seq.done();
    assert_eq!(seq.current_event(), Some(0));
    assert!(seq.step(0).unwrap().done);

    // The successor goes live on the next tick.
    let live = tick(&mut seq, &[false, false, false]);
    assert_eq!(live, vec![false, true, false]);
}

/// `done()` skips over asynchronous steps to the next blocking one
#[test]
fn test_force_close_skips_asynchronous_steps() {
    let (mut seq, _) = manual_sequencer();
    seq.poll(true, false);
    seq.poll(false, false);
    seq.finish_construction();

    seq.done();
    assert!(!seq.step(0).unwrap().done);
    assert!(seq.step(1).unwrap().done);
    assert_eq!(seq.current_event(), Some(1));
    assert!(seq.is_fulfilled());
}

/// `set_to_now` rewinds runtime progress from the cursor onward while
/// keeping the recorded pipeline intact
#[test]
fn test_set_to_now_rewinds_remaining_steps() {
    let (mut seq, _) = sync_chain(3);

    // Run steps 0 and 1 to completion; step 2 goes live.
    tick(&mut seq, &[true, false, false]);
    tick(&mut seq, &[false, true, false]);
    assert_eq!(seq.current_event(), Some(1));
    assert_phases(&seq, &[StepPhase::Done, StepPhase::Done, StepPhase::Active]);

    // Cursor sits on the last step after a full tick; rewinding clears
    // only that step and rolls the event back to its gate.
    seq.set_to_now();
    assert_eq!(seq.current_event(), Some(1));
    assert_phases(&seq, &[StepPhase::Done, StepPhase::Done, StepPhase::Pending]);

    // The rewound step starts again and completes normally.
    let live = tick(&mut seq, &[false, false, false]);
    assert_eq!(live, vec![false, false, true]);
    tick(&mut seq, &[false, false, true]);
    assert!(seq.is_fulfilled());
}

/// Rewinding with the cursor on step 0 wipes all runtime progress
#[test]
fn test_set_to_now_from_pipeline_start() {
    let (mut seq, _) = sync_chain(3);

    tick(&mut seq, &[true, false, false]);

    // Advance one call into the next tick so the cursor is on step 0.
    seq.poll(false, false);
    seq.set_to_now();

    assert_eq!(seq.current_event(), None);
    assert_phases(
        &seq,
        &[StepPhase::Pending, StepPhase::Pending, StepPhase::Pending],
    );
}

/// After reset, an identical call sequence reproduces identical results
#[test]
fn test_reset_then_reuse_matches_fresh_instance() {
    let script_done = [
        [false, false, false],
        [true, false, false],
        [false, true, false],
        [false, false, true],
    ];

    let run = |seq: &mut tickflow::Sequencer<tickflow::ManualClock>| -> Vec<Vec<bool>> {
        for _ in 0..3 {
            seq.poll(false, false);
        }
        seq.finish_construction();
        script_done
            .iter()
            .map(|done| tick(seq, done))
            .collect()
    };

    let (mut fresh, _) = manual_sequencer();
    let expected = run(&mut fresh);
    assert!(fresh.is_fulfilled());

    fresh.reset();
    let replayed = run(&mut fresh);
    assert_eq!(replayed, expected);
    assert!(fresh.is_fulfilled());
}

/// Fulfillment requires the current event to reach the last index
#[test]
fn test_fulfilled_only_at_last_index() {
    let (mut seq, _) = sync_chain(2);
    assert!(!seq.is_fulfilled());

    tick(&mut seq, &[true, false]);
    assert_eq!(seq.current_event(), Some(0));
    assert!(!seq.is_fulfilled());

    tick(&mut seq, &[false, true]);
    assert_eq!(seq.current_event(), Some(1));
    assert!(seq.is_fulfilled());
}
