//! Fetching a reconstructable quorum of shards from remote hosts.
//!
//! The fetcher only needs something that can produce one shard on request,
//! described by [`ShardSource`]. [`HostSet`] adapts a set of per-host
//! [`Session`]s into such sources, serializing requests on each session.

use std::sync::Arc;

use crate::types::{Fetched, ShardRequest};

mod cancel;
mod host;
mod quorum;

pub use cancel::{CancelSignal, Canceller, cancel_pair};
pub use host::{HostKey, HostSet, HostSource, Session};
pub use quorum::{QuorumShards, fetch_quorum};

/// A remote holder of one shard position.
///
/// `fetch` may block; it should return early with an error once `cancel`
/// fires.
pub trait ShardSource: Send + Sync {
    /// Identity used to attribute failures and statistics.
    fn host_key(&self) -> HostKey;

    /// Downloads the requested shard.
    fn fetch(&self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched>;
}

impl<T: ShardSource + ?Sized> ShardSource for &T {
    fn host_key(&self) -> HostKey {
        (**self).host_key()
    }

    fn fetch(&self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched> {
        (**self).fetch(request, cancel)
    }
}

impl<T: ShardSource + ?Sized> ShardSource for Box<T> {
    fn host_key(&self) -> HostKey {
        (**self).host_key()
    }

    fn fetch(&self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched> {
        (**self).fetch(request, cancel)
    }
}

impl<T: ShardSource + ?Sized> ShardSource for Arc<T> {
    fn host_key(&self) -> HostKey {
        (**self).host_key()
    }

    fn fetch(&self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched> {
        (**self).fetch(request, cancel)
    }
}
