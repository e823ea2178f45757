use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hashbrown::HashMap;
use tracing::{debug, warn};

use super::{CancelSignal, ShardSource};
use crate::error::{FetchError, HostKeyError};
use crate::types::{Fetched, ShardRequest};

/// Ed25519 public key identifying a storage host.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostKey([u8; 32]);

impl HostKey {
    /// Textual prefix naming the key algorithm.
    pub const PREFIX: &'static str = "ed25519:";

    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes in hex, enough to tell hosts apart in messages.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Display for HostKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl Debug for HostKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HostKey({})", self.short())
    }
}

impl FromStr for HostKey {
    type Err = HostKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s.strip_prefix(Self::PREFIX).ok_or(HostKeyError::MissingPrefix)?;
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(encoded, &mut bytes)?;
        Ok(Self(bytes))
    }
}

/// An open protocol session with one host.
pub trait Session: Send {
    fn fetch(&mut self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched>;
}

enum Slot<S> {
    Ready(Mutex<S>),
    Failed(Arc<anyhow::Error>),
}

/// Sessions keyed by host, each usable by one caller at a time.
///
/// Hosts whose session could not be established stay in the set together
/// with the reason, which is reported whenever the host is asked for a shard.
pub struct HostSet<S> {
    sessions: HashMap<HostKey, Slot<S>>,
}

impl<S: Session> HostSet<S> {
    /// Creates a set with no hosts.
    pub fn new() -> Self {
        Self { sessions: HashMap::new() }
    }

    /// Registers `host` with the outcome of establishing its session.
    ///
    /// A failed session is still recorded and the error is returned as well.
    /// Re-adding a host replaces its previous slot.
    pub fn add_host(&mut self, host: HostKey, session: anyhow::Result<S>) -> Result<(), FetchError> {
        match session {
            Ok(session) => {
                debug!(host = %host.short(), "added host session");
                self.sessions.insert(host, Slot::Ready(Mutex::new(session)));
                Ok(())
            }
            Err(error) => {
                let error = Arc::new(error);
                warn!(host = %host.short(), error = %format!("{error:#}"), "host session unavailable");
                self.sessions.insert(host, Slot::Failed(Arc::clone(&error)));
                Err(FetchError::Session(error))
            }
        }
    }

    /// Locks the host's session for exclusive use.
    ///
    /// Blocks while another caller holds the same session.
    pub fn acquire(&self, host: &HostKey) -> Result<MutexGuard<'_, S>, FetchError> {
        match self.sessions.get(host) {
            None => Err(FetchError::UnknownHost(*host)),
            Some(Slot::Failed(error)) => Err(FetchError::Session(Arc::clone(error))),
            Some(Slot::Ready(session)) => Ok(session.lock().unwrap_or_else(PoisonError::into_inner)),
        }
    }

    /// A [`ShardSource`] that fetches through `host`'s session.
    pub fn source(&self, host: HostKey) -> HostSource<'_, S> {
        HostSource { set: self, host }
    }

    /// One source per shard position; positions without a known host are `None`.
    pub fn sources(&self, hosts: &[Option<HostKey>]) -> Vec<Option<HostSource<'_, S>>> {
        hosts.iter().map(|host| host.filter(|host| self.contains(host)).map(|host| self.source(host))).collect()
    }

    /// Checks whether `host` was ever added, whatever its session outcome.
    ///
    /// # Arguments
    /// * `host` - Key to look up
    ///
    /// # Returns
    /// `true` for ready and failed hosts alike
    pub fn contains(&self, host: &HostKey) -> bool {
        self.sessions.contains_key(host)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostKey> {
        self.sessions.keys()
    }

    /// Number of registered hosts.
    ///
    /// # Returns
    /// The count of ready and failed hosts
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S: Session> Default for HostSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shard source backed by a session in a [`HostSet`].
pub struct HostSource<'a, S> {
    set: &'a HostSet<S>,
    host: HostKey,
}

impl<S: Session> ShardSource for HostSource<'_, S> {
    fn host_key(&self) -> HostKey {
        self.host
    }

    fn fetch(&self, request: ShardRequest, cancel: &CancelSignal) -> anyhow::Result<Fetched> {
        let mut session = self.set.acquire(&self.host)?;
        session.fetch(request, cancel)
    }
}
