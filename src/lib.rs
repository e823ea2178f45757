//! Shardweave - Erasure-coded shard storage primitives.
//!
//! Splits data into shards that can be spread across independent storage hosts
//! and rebuilds it from any sufficient subset:
//! - GF(256) arithmetic with SIMD kernels for bulk multiplication
//! - Systematic Reed-Solomon coding with a cache of decode matrices
//! - Parallel, chunked coding on the Rayon thread pool
//! - Quorum shard fetching with failover and cancellation

pub mod config;
pub mod encoding;
pub mod error;
pub mod fetch;
pub mod galois;
pub mod inversion;
pub mod matrix;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use encoding::{ReedSolomon, Shards};
pub use error::{CodingError, FetchError};
pub use fetch::{CancelSignal, Canceller, HostKey, HostSet, QuorumShards, Session, ShardSource, cancel_pair, fetch_quorum};
pub use galois::Kernel;
pub use worker::ExecutorOptions;
