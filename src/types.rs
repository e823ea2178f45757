//! Value types exchanged between the quorum fetcher and shard sources.
//!
//! # Overview
//!
//! - [`ShardRequest`]: Identifies one shard of one chunk
//! - [`TransferStats`]: Size and duration of a completed download
//! - [`Fetched`]: Bytes returned by a source together with its statistics
//! - [`StatsUpdate`]: Statistics attributed to the host that produced them

use std::fmt::{Display, Formatter, Result};
use std::time::Duration;

use bytesize::ByteSize;

use crate::fetch::HostKey;

/// A request for a single shard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShardRequest {
    /// Index of the chunk the shard belongs to.
    pub chunk: u64,

    /// Position of the shard within the chunk, `0..total_shards`.
    pub shard: usize,
}

/// Measurements of one completed download.
///
/// Callers feed these into their own host scheduling; nothing in this crate
/// interprets them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Bytes transferred, including any protocol overhead the source counts.
    pub bytes: u64,

    /// Wall-clock time spent on the transfer.
    pub elapsed: Duration,
}

impl TransferStats {
    /// Records one finished transfer.
    ///
    /// # Arguments
    /// * `bytes` - Payload size
    /// * `elapsed` - Wall time the transfer took
    #[inline]
    pub fn new(bytes: u64, elapsed: Duration) -> Self {
        Self { bytes, elapsed }
    }

    /// Average throughput in bytes per second, zero for an instantaneous transfer.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let bytes = self.bytes as f64;
        bytes / secs
    }
}

impl Display for TransferStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} in {:?}", ByteSize::b(self.bytes), self.elapsed)
    }
}

/// The successful outcome of a shard download.
#[derive(Debug)]
pub struct Fetched {
    /// The shard contents.
    pub data: Vec<u8>,

    /// How the transfer went.
    pub stats: TransferStats,
}

impl Fetched {
    #[inline]
    pub fn new(data: Vec<u8>, stats: TransferStats) -> Self {
        Self { data, stats }
    }
}

/// Transfer statistics attributed to a host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsUpdate {
    pub host: HostKey,
    pub stats: TransferStats,
}
