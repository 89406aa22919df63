//! Rule graph evaluation

use std::cell::RefCell;
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Errors from rule graph evaluation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// No rule or fact is registered under this name
    #[error("unknown condition '{0}'")]
    Unknown(String),

    /// Rule evaluation recursed back into itself
    #[error("condition cycle detected: {0}")]
    Cycle(String),
}

type Eval = Box<dyn Fn(&Scope<'_>) -> Result<bool, RuleError>>;

/// Named boolean conditions over shared facts
///
/// Facts are plain settable booleans (the shared state); rules are
/// evaluator closures that may consult facts and other rules through a
/// [`Scope`]. Nothing is cached: every `check` re-evaluates against the
/// current facts, so a mutation is visible to the next query. A rule
/// shadows a fact of the same name.
#[derive(Default)]
pub struct RuleGraph {
    facts: HashMap<String, bool>,
    rules: HashMap<String, Eval>,
}

impl RuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or create) a base fact
    pub fn set_fact(&mut self, name: impl Into<String>, value: bool) {
        self.facts.insert(name.into(), value);
    }

    /// Read a base fact directly, bypassing rules
    pub fn fact(&self, name: &str) -> Option<bool> {
        self.facts.get(name).copied()
    }

    /// Register a derived rule under `name`
    ///
    /// The evaluator receives a [`Scope`] for consulting other
    /// conditions; returning an error aborts the whole evaluation.
    pub fn add_rule<F>(&mut self, name: impl Into<String>, eval: F)
    where
        F: Fn(&Scope<'_>) -> Result<bool, RuleError> + 'static,
    {
        self.rules.insert(name.into(), Box::new(eval));
    }

    /// Whether a rule or fact is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name) || self.facts.contains_key(name)
    }

    /// Evaluate the named condition against the current facts
    pub fn check(&self, name: &str) -> Result<bool, RuleError> {
        let scope = Scope {
            graph: self,
            stack: RefCell::new(Vec::new()),
        };
        scope.check(name)
    }
}

impl std::fmt::Debug for RuleGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleGraph")
            .field("facts", &self.facts)
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Evaluation context handed to rule closures
///
/// Tracks the chain of rules currently being evaluated so that a rule
/// reaching back into that chain fails with [`RuleError::Cycle`]
/// instead of recursing forever.
pub struct Scope<'a> {
    graph: &'a RuleGraph,
    stack: RefCell<Vec<String>>,
}

impl Scope<'_> {
    /// Evaluate another named condition (rule first, then fact)
    pub fn check(&self, name: &str) -> Result<bool, RuleError> {
        if let Some(eval) = self.graph.rules.get(name) {
            if self.stack.borrow().iter().any(|n| n == name) {
                let mut path = self.stack.borrow().join(" -> ");
                path.push_str(" -> ");
                path.push_str(name);
                return Err(RuleError::Cycle(path));
            }
            self.stack.borrow_mut().push(name.to_string());
            let result = eval(self);
            self.stack.borrow_mut().pop();
            trace!(rule = name, result = ?result, "evaluated rule");
            return result;
        }
        self.fact(name)
    }

    /// Read a base fact, ignoring any rule of the same name
    pub fn fact(&self, name: &str) -> Result<bool, RuleError> {
        self.graph
            .fact(name)
            .ok_or_else(|| RuleError::Unknown(name.to_string()))
    }
}
