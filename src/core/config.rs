//! Sequence configuration from YAML
//!
//! The declarative face of the sequencer: describe the pipeline once as
//! ordered step descriptors, build a sealed sequencer from it, then
//! drive it through the position-checked `advance` API. Gate derivation
//! is identical to recording the same steps through `poll` calls.

use crate::core::clock::{Clock, SystemClock};
use crate::core::sequencer::Sequencer;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level sequence configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Sequence name, used in log output
    pub name: String,

    /// Ordered step descriptors
    pub steps: Vec<StepConfig>,
}

/// Step descriptor as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Whether the step overlaps its successors instead of gating them
    #[serde(default)]
    pub asynchronous: bool,

    /// Whether the step may be skipped or closed out at runtime
    #[serde(default)]
    pub optional: bool,

    /// Minimum time the step must sit eligible before starting
    #[serde(default)]
    pub delay_secs: Option<f64>,

    /// Gate this step on the completion frontier reaching the whole
    /// pipeline declared before it
    #[serde(default)]
    pub barrier: bool,

    /// Explicit barrier target index (requires `barrier`)
    #[serde(default)]
    pub barrier_target: Option<usize>,
}

impl SequenceConfig {
    /// Load a sequence configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        Self::from_yaml(&content)
    }

    /// Parse a sequence configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: SequenceConfig =
            serde_yaml::from_str(yaml).context("failed to parse sequence YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the descriptor list
    pub fn validate(&self) -> Result<()> {
        let mut seen_ids = std::collections::HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.is_empty() {
                bail!("step {} has an empty id", index);
            }
            if !seen_ids.insert(&step.id) {
                bail!("duplicate step id: {}", step.id);
            }

            if let Some(delay) = step.delay_secs {
                if !delay.is_finite() || delay < 0.0 {
                    bail!("step '{}' has an invalid delay: {}", step.id, delay);
                }
            }

            if step.barrier_target.is_some() && !step.barrier {
                bail!(
                    "step '{}' sets barrier_target without barrier: true",
                    step.id
                );
            }
            if step.barrier {
                if index == 0 {
                    bail!("step '{}' cannot be a barrier: nothing precedes it", step.id);
                }
                // The gate relation is strictly backward.
                if let Some(target) = step.barrier_target {
                    if target >= index {
                        bail!(
                            "step '{}' barrier target {} is not behind index {}",
                            step.id,
                            target,
                            index
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Build a sealed sequencer driven by the system clock
    pub fn to_sequencer(&self) -> Sequencer<SystemClock> {
        self.to_sequencer_with_clock(SystemClock::new())
    }

    /// Build a sealed sequencer driven by the given clock
    ///
    /// The result is past its construction tick: the first advancement
    /// call is expected to reference step 0.
    pub fn to_sequencer_with_clock<C: Clock>(&self, clock: C) -> Sequencer<C> {
        let mut sequencer = Sequencer::with_clock(clock);
        for (index, step) in self.steps.iter().enumerate() {
            let barrier_target = if step.barrier && index > 0 {
                Some(step.barrier_target.unwrap_or(index - 1))
            } else {
                None
            };
            sequencer.record_descriptor(
                Some(step.id.clone()),
                step.asynchronous,
                step.optional,
                step.delay_secs.map(Duration::from_secs_f64),
                barrier_target,
            );
        }
        sequencer.finish_construction();
        sequencer
    }
}
