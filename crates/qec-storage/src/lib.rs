//! # QEC Storage — Blobs, Cache, Partitioning and Decode
//!
//! Everything the blob reader operator in `qec-exec` needs to turn a
//! dataset name into decoded batches: the storage-adapter contract, the
//! blob cache, partition schemes, the file decoder registry, and the
//! rayon-based parallel read+decode pipeline.

pub mod adapter;
pub mod cache;
pub mod decoders;
pub mod partition;
pub mod pipeline;

pub use adapter::{InMemoryAdapter, LocalDiskAdapter, StorageAdapter};
pub use cache::{BlobCache, CacheOutcome, InMemoryBlobCache, MAX_SIZE_SINGLE_CACHE_ITEM};
pub use decoders::{lookup_extension, Decoder, ExtensionKind};
pub use partition::{DefaultPartitionScheme, MabelPartitionScheme, PartitionScheme};
pub use pipeline::{read_and_decode, ReadResult, ReadTask};
