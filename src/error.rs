//! Error types for coding and fetching.

use std::fmt::Write as _;
use std::io;
use std::sync::Arc;

use crate::config::MAX_TOTAL_SHARDS;
use crate::fetch::HostKey;

/// Errors raised by the field arithmetic, the coding matrix and the coder.
#[derive(Debug, thiserror::Error)]
pub enum CodingError {
    /// Data or parity shard count is zero.
    #[error("cannot create coder with zero data or parity shards")]
    InvalidShardCount,

    /// Data + parity exceeds the size of the field.
    #[error("cannot create coder with more than {max} data+parity shards, got {total}", max = MAX_TOTAL_SHARDS)]
    ShardCountTooLarge { total: usize },

    /// The shard slice does not have one entry per configured shard.
    #[error("expected {expected} shards, got {actual}")]
    ShardCountMismatch { expected: usize, actual: usize },

    /// Non-empty shards differ in length.
    #[error("shard sizes do not match")]
    ShardSizeMismatch,

    /// Every shard is empty.
    #[error("no shard data")]
    NoShardData,

    /// Fewer shards are present than are needed to rebuild the rest.
    #[error("too few shards given: need {needed}, have {present}")]
    TooFewShards { needed: usize, present: usize },

    /// Gauss-Jordan elimination found a column without a usable pivot.
    #[error("matrix is singular")]
    MatrixNotInvertible,

    /// Operand dimensions are incompatible.
    #[error("matrix dimensions do not match: {0}")]
    MatrixShape(&'static str),

    /// Non-zero value divided by zero.
    #[error("division by zero in GF(256)")]
    DivideByZero,

    /// The shards do not hold as many bytes as requested.
    #[error("not enough data to fill the requested range")]
    ShortData,

    /// A data shard needed for joining is empty.
    #[error("reconstruction required as one or more required data shards are empty")]
    ReconstructRequired,

    /// Striping block size of zero.
    #[error("block size must be non-zero")]
    ZeroBlockSize,

    /// Writing joined data failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A single failed shard download.
#[derive(Debug)]
pub struct SourceFailure {
    /// Index of the shard that could not be fetched.
    pub shard: usize,

    /// Host that was asked, `None` when no source exists for the shard.
    pub host: Option<HostKey>,

    /// Underlying failure, already annotated with the host.
    pub error: anyhow::Error,
}

/// Errors raised by the quorum fetcher and the host set.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The caller aborted the fetch.
    ///
    /// Not a failure of any host: callers should treat it separately from
    /// the other variants, see [`FetchError::is_canceled`].
    #[error("shard download canceled")]
    Canceled,

    /// More sources failed than the quorum can tolerate.
    #[error("too many hosts did not supply their shard ({} failed, {tolerated} tolerated):\n{}", .failures.len(), render_failures(.failures))]
    TooManyFailures { tolerated: usize, failures: Vec<SourceFailure> },

    /// Quorum outside `1..=sources`.
    #[error("invalid quorum {quorum} for {sources} sources")]
    InvalidQuorum { quorum: usize, sources: usize },

    /// Every fetch worker stopped before a decision was reached.
    #[error("fetch workers exited unexpectedly")]
    WorkersExited,

    /// No session was ever registered for the host.
    #[error("no record of host {0}")]
    UnknownHost(HostKey),

    /// The host's session could not be established.
    #[error("host session unavailable: {0:#}")]
    Session(Arc<anyhow::Error>),
}

impl FetchError {
    /// Reports whether this is a caller-requested abort rather than a failure.
    #[inline]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Errors raised while parsing a [`HostKey`].
#[derive(Debug, thiserror::Error)]
pub enum HostKeyError {
    #[error("host key must start with \"ed25519:\"")]
    MissingPrefix,

    #[error("invalid host key: {0}")]
    Hex(#[from] hex::FromHexError),
}

// Sources that were never available are noise in the report.
fn render_failures(failures: &[SourceFailure]) -> String {
    let mut rendered = String::new();
    for failure in failures.iter().filter(|failure| failure.host.is_some()) {
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        let _ = write!(rendered, "{:#}", failure.error);
    }
    rendered
}
