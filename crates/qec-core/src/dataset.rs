//! Dataset identifiers (§3 "Dataset identifier").
//!
//! A reader's dataset is one of four tagged variants rather than a bare
//! string, which is how the design notes (§9, "Circular planner/reader
//! dependency") say to break the cycle between the reader and an embedded
//! sub-plan: the sub-plan is just another `PlanOperator`, not a re-entry
//! into a planner type this crate doesn't own.

use std::sync::Arc;

use crate::operator::PlanOperator;

#[derive(Clone)]
pub enum DatasetIdentifier {
    /// A dotted name resolved against a storage prefix registry, e.g.
    /// `tests.data.parquet`.
    Name(String),
    /// One of the sample names, including its `$` prefix (`$planets`, ...).
    Sample(String),
    /// A dataset-producing function call, e.g. `generate_series(...)`.
    Function { name: String, args: Vec<String>, alias: Option<String> },
    /// An embedded subquery plan.
    SubPlan(Arc<dyn PlanOperator>),
}

impl std::fmt::Debug for DatasetIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetIdentifier::Name(n) => write!(f, "Name({n})"),
            DatasetIdentifier::Sample(n) => write!(f, "Sample({n})"),
            DatasetIdentifier::Function { name, args, alias } => {
                write!(f, "Function({name}, args={args:?}, alias={alias:?})")
            }
            DatasetIdentifier::SubPlan(p) => write!(f, "SubPlan({})", p.name()),
        }
    }
}
