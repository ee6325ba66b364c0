//! Error taxonomy for the query engine core (§7 of the design spec).
//!
//! Cache and schema-reconciliation failures are recovered locally by callers
//! (see `qec-storage`/`qec-exec`); everything else propagates as one of
//! these variants to the query's caller.

/// Errors surfaced at the engine boundary.
#[derive(Debug, thiserror::Error)]
pub enum QecError {
    /// No partitions with any DATA blobs were found for a dataset, or a
    /// sample/function dataset name is unrecognized.
    #[error("dataset not found: {0}")]
    DatasetNotFound(String),

    /// The SQL surface (an external collaborator) produced something this
    /// engine can't act on.
    #[error("invalid SQL: {0}")]
    InvalidSql(String),

    /// An operator was wired with the wrong number of producers.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A blob could not be decoded into a batch.
    #[error("decode error: {0}")]
    Decode(String),

    /// A storage adapter failed to list or read a blob.
    #[error("storage error: {0}")]
    Storage(String),

    /// A blob cache transport failure that could not be locally recovered.
    #[error("cache error: {0}")]
    Cache(String),

    /// The expression evaluator rejected a predicate or projection.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// `QecConfig` couldn't be loaded or parsed.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),
}

pub type Result<T> = std::result::Result<T, QecError>;
