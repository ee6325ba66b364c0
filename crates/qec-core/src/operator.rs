//! The plan operator framework (§4.1).
//!
//! Every operator in `qec-exec` implements `PlanOperator`. The engine wires
//! a plan together by calling `set_producers` on each operator from the
//! leaves up; `execute()` then returns a lazy, pull-based sequence of
//! batches that requests input from its producers on demand. Operators are
//! one-shot: re-entering `execute()` on a stateful operator (Sort,
//! Aggregate, Distinct) after it has been consumed is not supported, the
//! same assumption the framework documents in §4.1.

use std::sync::Arc;

use crate::batch::Batch;
use crate::error::{QecError, Result};

/// A finite, lazy sequence of result batches.
pub type BatchStream = Box<dyn Iterator<Item = Result<Batch>> + Send>;

/// How many producers an operator expects to be wired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerArity {
    /// Leaves (readers) take none.
    Exactly(usize),
    /// N-way joins and `UNNEST` take a variable, non-zero number.
    AtLeast(usize),
}

impl ProducerArity {
    fn accepts(self, n: usize) -> bool {
        match self {
            ProducerArity::Exactly(expected) => n == expected,
            ProducerArity::AtLeast(min) => n >= min,
        }
    }
}

pub trait PlanOperator: Send + Sync {
    /// Human label, e.g. "Selection", "Blob Reader".
    fn name(&self) -> &'static str;

    /// A display string describing this operator's configuration, for
    /// `EXPLAIN` output.
    fn config(&self) -> String;

    /// How many producers this operator expects.
    fn expected_producers(&self) -> ProducerArity {
        ProducerArity::Exactly(1)
    }

    /// Currently-wired producers.
    fn producers(&self) -> &[Arc<dyn PlanOperator>];

    /// Wire this operator's producers without arity validation; operators
    /// implement this, `set_producers` is the arity-checked entry point
    /// the planner actually calls.
    fn set_producers_unchecked(&mut self, producers: Vec<Arc<dyn PlanOperator>>);

    /// Wire producers, failing with `InvalidPlanError` if the count doesn't
    /// match `expected_producers()`.
    fn set_producers(&mut self, producers: Vec<Arc<dyn PlanOperator>>) -> Result<()> {
        if !self.expected_producers().accepts(producers.len()) {
            return Err(QecError::InvalidPlan(format!(
                "{} expects {:?} producers, got {}",
                self.name(),
                self.expected_producers(),
                producers.len()
            )));
        }
        self.set_producers_unchecked(producers);
        Ok(())
    }

    /// Stream this operator's output batches, pulling from its producers as
    /// needed.
    fn execute(&self) -> BatchStream;
}
