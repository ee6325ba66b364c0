//! # QEC Exec — Physical Plan Operators
//!
//! Every operator in this crate implements `qec_core::PlanOperator`:
//! a pull-based, producer-wired node that yields `Batch`es lazily.
//! Operators are assembled bottom-up by a caller (normally a planner,
//! out of scope here) via `set_producers`, then driven by calling
//! `execute()` on the root and pulling from the returned iterator.
//!
//! ## Leaves
//! - [`internal::InternalDatasetOperator`] — `$`-prefixed sample datasets
//! - [`function_node::FunctionDatasetOperator`] — `generate_series`, `values`
//! - [`blob_reader::BlobReaderOperator`] — partitioned blob scan + decode
//!
//! ## Row/stream operators
//! - [`selection::SelectionOperator`], [`projection::ProjectionOperator`]
//! - [`distinct::DistinctOperator`], [`limit::LimitOperator`], [`offset::OffsetOperator`]
//! - [`sort::SortOperator`], [`aggregate::AggregateOperator`], [`join::JoinOperator`]
//!
//! ## Support
//! - [`evaluator`] — the scalar expression tree operators evaluate against
//! - [`samples`] — the synthetic `$planets`/`$satellites`/`$astronauts`/`$no_table` fixtures
//! - [`consolidate::consolidate_batches`] — merges small batches up to a target row count

pub mod aggregate;
pub mod blob_reader;
pub mod consolidate;
pub mod distinct;
pub mod evaluator;
pub mod function_node;
pub mod functions;
pub mod internal;
pub mod join;
pub mod limit;
pub mod offset;
pub mod projection;
pub mod samples;
pub mod selection;
pub mod sort;

pub use aggregate::{AggregateExpr, AggregateFunction, AggregateOperator};
pub use blob_reader::BlobReaderOperator;
pub use consolidate::consolidate_batches;
pub use distinct::DistinctOperator;
pub use evaluator::{CompareOp, Expr, Literal};
pub use function_node::FunctionDatasetOperator;
pub use internal::InternalDatasetOperator;
pub use join::{JoinKey, JoinOperator, JoinType};
pub use limit::LimitOperator;
pub use offset::OffsetOperator;
pub use projection::{ProjectionColumn, ProjectionOperator};
pub use selection::SelectionOperator;
pub use sort::{SortDirection, SortKey, SortOperator};
