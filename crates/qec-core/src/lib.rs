//! # QEC Core — Batch, Schema, Statistics and Operator Abstractions
//!
//! This crate provides the foundational types shared across the query
//! engine: the columnar batch abstraction, schema normalization, the
//! statistics record, `WITH (...)` hints, the dataset identifier, and the
//! `PlanOperator` trait that every physical operator in `qec-exec`
//! implements.
//!
//! ## Key Components
//!
//! - **Batch**: an immutable columnar table with per-column/per-table metadata
//! - **PlanOperator**: the pull-based, producer-wired operator contract
//! - **Statistics**: atomic counters and timers collected across a query
//! - **Hints**: `WITH (...)` directives that tweak reader/cache/partition behavior
//! - **QecConfig**: engine-wide cache/partition-scheme/prefix configuration

pub mod batch;
pub mod config;
pub mod dataset;
pub mod error;
pub mod hints;
pub mod operator;
pub mod schema;
pub mod stats;

pub use batch::{Batch, ColumnMeta, TableMeta};
pub use config::{PartitionSchemeChoice, QecConfig};
pub use dataset::DatasetIdentifier;
pub use error::{QecError, Result};
pub use hints::Hints;
pub use operator::{BatchStream, PlanOperator, ProducerArity};
pub use schema::normalize_types;
pub use stats::{Statistics, StatisticsSnapshot};
