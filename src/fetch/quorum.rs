//! Bounded-concurrency shard download with failover.
//!
//! Exactly `quorum` worker threads pull shard indices from a shared queue.
//! The calling thread collects their outcomes and, for every failure, queues
//! the next untried index. It stops as soon as:
//! 1. `quorum` shards arrived (success)
//! 2. more than `sources - quorum` attempts failed (no quorum is reachable)
//! 3. the cancel signal fired
//!
//! # Thread Safety
//!
//! Workers are scoped threads joined before `fetch_quorum` returns on every
//! path. A halt signal fired on exit stops workers from starting new attempts
//! and is the signal handed to sources, so in-flight fetches end too.

use std::thread;

use anyhow::{Context, anyhow};
use bytesize::ByteSize;
use flume::{Receiver, Selector, Sender};
use tracing::{debug, trace, warn};

use super::{CancelSignal, ShardSource, cancel_pair};
use crate::error::{FetchError, SourceFailure};
use crate::fetch::HostKey;
use crate::types::{Fetched, ShardRequest, StatsUpdate};

/// A reconstructable set of shards.
#[derive(Debug)]
pub struct QuorumShards {
    /// One entry per source. Fetched shards sit at their index; every other
    /// entry is empty with capacity for `shard_len` bytes, ready to be filled
    /// by [`ReedSolomon::reconstruct`](crate::encoding::ReedSolomon::reconstruct).
    pub shards: Vec<Vec<u8>>,

    /// Length of the first non-empty fetched shard.
    pub shard_len: usize,

    /// One update per fetched shard, in arrival order.
    pub stats: Vec<StatsUpdate>,
}

enum Attempt {
    Fetched { shard: usize, host: HostKey, fetched: Fetched },
    Failed(SourceFailure),
}

enum Event {
    Attempt(Attempt),
    Canceled,
    Exited,
}

/// Downloads shards of `chunk` until `quorum` of them arrived.
///
/// `sources[i]` serves shard `i`; `None` marks a position with no host, which
/// counts as a failure without any request being made. Indices are tried in
/// ascending order.
///
/// # Errors
///
/// * [`FetchError::InvalidQuorum`] - `quorum` is zero or exceeds `sources.len()`.
/// * [`FetchError::TooManyFailures`] - more than `sources.len() - quorum` attempts failed.
/// * [`FetchError::Canceled`] - `cancel` fired before a decision was reached.
///
/// Shards fetched before a failure are discarded.
pub fn fetch_quorum<S: ShardSource>(sources: &[Option<S>], chunk: u64, quorum: usize, cancel: &CancelSignal) -> Result<QuorumShards, FetchError> {
    let total = sources.len();
    if quorum == 0 || quorum > total {
        return Err(FetchError::InvalidQuorum { quorum, sources: total });
    }
    let tolerated = total - quorum;
    trace!(chunk, quorum, sources = total, "fetching shard quorum");

    thread::scope(|scope| {
        // Sources get `halt`, not `cancel`: it fires on every exit, so fetches
        // still in flight stop once the outcome is decided.
        let (stop, halt) = cancel_pair();

        // At most `quorum` requests and results are ever outstanding, so neither channel blocks a sender.
        let (requests, queue) = flume::bounded::<usize>(quorum);
        let (results, outcomes) = flume::bounded::<Attempt>(quorum);
        for _ in 0..quorum {
            let (queue, results, halt) = (queue.clone(), results.clone(), halt.clone());
            scope.spawn(move || run_worker(sources, chunk, cancel, &halt, &queue, &results));
        }
        drop((queue, results));

        let outcome = collect(total, quorum, tolerated, &requests, &outcomes, cancel);

        stop.cancel();
        drop(requests);
        outcome
    })
    .map(|successes| assemble(chunk, total, successes))
}

fn run_worker<S: ShardSource>(sources: &[Option<S>], chunk: u64, cancel: &CancelSignal, halt: &CancelSignal, queue: &Receiver<usize>, results: &Sender<Attempt>) {
    for shard in queue.iter() {
        if halt.is_canceled() || cancel.is_canceled() {
            break;
        }

        let attempt = match &sources[shard] {
            None => Attempt::Failed(SourceFailure { shard, host: None, error: anyhow!("no source for shard {shard}") }),
            Some(source) => {
                let host = source.host_key();
                trace!(chunk, shard, host = %host.short(), "requesting shard");
                match source.fetch(ShardRequest { chunk, shard }, halt).with_context(|| host.short()) {
                    Ok(fetched) => Attempt::Fetched { shard, host, fetched },
                    Err(error) => Attempt::Failed(SourceFailure { shard, host: Some(host), error }),
                }
            }
        };

        if results.send(attempt).is_err() {
            break;
        }
    }
}

fn collect(total: usize, quorum: usize, tolerated: usize, requests: &Sender<usize>, outcomes: &Receiver<Attempt>, cancel: &CancelSignal) -> Result<Vec<(usize, HostKey, Fetched)>, FetchError> {
    if cancel.is_canceled() {
        return Err(FetchError::Canceled);
    }
    for shard in 0..quorum {
        requests.send(shard).map_err(|_| FetchError::WorkersExited)?;
    }
    let mut next = quorum;

    let mut successes = Vec::with_capacity(quorum);
    let mut failures: Vec<SourceFailure> = Vec::new();
    while successes.len() < quorum {
        if failures.len() > tolerated {
            warn!(failed = failures.len(), tolerated, "shard quorum unreachable");
            return Err(FetchError::TooManyFailures { tolerated, failures });
        }
        if cancel.is_canceled() {
            debug!(fetched = successes.len(), "shard download canceled");
            return Err(FetchError::Canceled);
        }

        let event = match cancel.receiver() {
            Some(signal) => Selector::new().recv(outcomes, |attempt| attempt.map_or(Event::Exited, Event::Attempt)).recv(signal, |_| Event::Canceled).wait(),
            None => outcomes.recv().map_or(Event::Exited, Event::Attempt),
        };

        match event {
            Event::Attempt(Attempt::Fetched { shard, host, fetched }) => {
                trace!(shard, host = %host.short(), stats = %fetched.stats, "shard fetched");
                successes.push((shard, host, fetched));
            }
            Event::Attempt(Attempt::Failed(failure)) => {
                warn!(shard = failure.shard, error = %format!("{:#}", failure.error), "shard fetch failed");
                failures.push(failure);
                if next < total {
                    requests.send(next).map_err(|_| FetchError::WorkersExited)?;
                    next += 1;
                }
            }
            Event::Canceled => {
                debug!(fetched = successes.len(), "shard download canceled");
                return Err(FetchError::Canceled);
            }
            Event::Exited => return Err(FetchError::WorkersExited),
        }
    }

    debug!(failed = failures.len(), "shard quorum reached");
    Ok(successes)
}

fn assemble(chunk: u64, total: usize, successes: Vec<(usize, HostKey, Fetched)>) -> QuorumShards {
    let shard_len = successes.iter().map(|(_, _, fetched)| fetched.data.len()).find(|&len| len > 0).unwrap_or(0);
    let bytes: u64 = successes.iter().map(|(_, _, fetched)| fetched.stats.bytes).sum();

    let mut shards: Vec<Vec<u8>> = (0..total).map(|_| Vec::new()).collect();
    let mut stats = Vec::with_capacity(successes.len());
    for (shard, host, fetched) in successes {
        stats.push(StatsUpdate { host, stats: fetched.stats });
        shards[shard] = fetched.data;
    }
    for shard in &mut shards {
        if shard.is_empty() {
            *shard = Vec::with_capacity(shard_len);
        }
    }

    debug!(chunk, shard_len, transferred = %ByteSize::b(bytes), "fetched shard quorum");
    QuorumShards { shards, shard_len, stats }
}
