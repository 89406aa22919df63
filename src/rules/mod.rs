//! Named-condition rule graph
//!
//! Boolean conditions whose truth may depend on other named conditions,
//! evaluated on demand against mutable facts.

pub mod graph;

pub use graph::{RuleError, RuleGraph, Scope};
