//! Two-phase construction and position-checked advancement

use tickflow::{ManualClock, SequenceConfig, Sequencer, SequencerError};

const ROUTINE: &str = r#"
name: "score preload"
steps:
  - id: "raise_arm"
    asynchronous: true
  - id: "drive_to_hub"
  - id: "release"
    barrier: true
"#;

fn built() -> Sequencer<ManualClock> {
    SequenceConfig::from_yaml(ROUTINE)
        .unwrap()
        .to_sequencer_with_clock(ManualClock::new())
}

/// Descriptors build a sealed pipeline with the same gate derivation as
/// recording the calls positionally
#[test]
fn test_build_produces_sealed_pipeline() {
    let seq = built();
    assert!(!seq.is_recording());
    assert_eq!(seq.len(), 3);
    assert_eq!(seq.index_of("drive_to_hub"), Some(1));
    assert_eq!(seq.step(0).unwrap().start_condition, None);
    assert_eq!(seq.step(1).unwrap().start_condition, None);
    assert!(seq.step(2).unwrap().must_finish);
    assert_eq!(seq.step(2).unwrap().start_condition, Some(1));
}

/// A full run to fulfillment through the checked API
#[test]
fn test_advance_runs_pipeline_to_fulfillment() {
    let mut seq = built();

    // Both leading steps go live on the first tick; the barrier waits.
    assert!(seq.advance(0, false).unwrap());
    assert!(seq.advance(1, false).unwrap());
    assert!(!seq.advance(2, false).unwrap());

    // The blocking drive finishes first; the barrier still waits on the
    // overlapped arm.
    assert!(seq.advance(0, false).unwrap());
    assert!(!seq.advance(1, true).unwrap());
    assert!(!seq.advance(2, false).unwrap());

    // Arm completes; the barrier opens.
    assert!(!seq.advance(0, true).unwrap());
    assert!(!seq.advance(1, false).unwrap());
    assert!(seq.advance(2, false).unwrap());

    // Release finishes; the pipeline is satisfied.
    assert!(!seq.advance(0, false).unwrap());
    assert!(!seq.advance(1, false).unwrap());
    assert!(!seq.advance(2, true).unwrap());
    assert!(seq.is_fulfilled());
}

/// Out-of-order calls are rejected instead of desynchronizing state
#[test]
fn test_out_of_order_call_is_rejected() {
    let mut seq = built();
    assert!(seq.advance(0, false).is_ok());
    assert_eq!(
        seq.advance(2, false),
        Err(SequencerError::CallOutOfOrder {
            expected: 1,
            got: 2
        })
    );
    // The failed call did not advance anything; the right call works.
    assert!(seq.advance(1, false).is_ok());
}

/// Calls beyond the constructed pipeline are rejected
#[test]
fn test_out_of_range_call_is_rejected() {
    let mut seq = built();
    assert_eq!(
        seq.advance(7, false),
        Err(SequencerError::StepOutOfRange { index: 7, len: 3 })
    );
}

/// The checked API refuses to run while a sequence is still recording
#[test]
fn test_advance_requires_sealed_sequence() {
    let mut seq = Sequencer::with_clock(ManualClock::new());
    seq.poll(false, false);
    assert_eq!(seq.advance(0, false), Err(SequencerError::StillRecording));
}

/// Config-driven delays and optional steps flow through to the steps
#[test]
fn test_config_carries_delay_and_optional() {
    let yaml = r#"
name: "test"
steps:
  - id: "a"
  - id: "b"
    optional: true
    delay_secs: 1.5
"#;
    let seq = SequenceConfig::from_yaml(yaml)
        .unwrap()
        .to_sequencer_with_clock(ManualClock::new());

    let step = seq.step(1).unwrap();
    assert!(step.optional);
    assert_eq!(step.delay, Some(std::time::Duration::from_millis(1500)));
}
