//! Tag correlation for concurrent requests
//!
//! Every request carries a client-chosen tag and the daemon echoes it back.
//! The correlator hands out tags, keeps a table of callers waiting on them,
//! and routes each decoded response to exactly one waiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::envelope::Envelope;
use super::error::{RpcError, RpcResult};

/// What a waiter eventually receives
pub type Outcome = RpcResult<Envelope>;

struct PendingEntry {
    seq: u64,
    tx: oneshot::Sender<Outcome>,
}

struct Inner {
    next_tag: AtomicU64,
    next_seq: AtomicU64,
    pending: Mutex<HashMap<u64, PendingEntry>>,
}

/// Hands out request tags and routes responses back to their callers
#[derive(Clone)]
pub struct TagCorrelator {
    inner: Arc<Inner>,
}

impl Default for TagCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TagCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCorrelator")
            .field("next_tag", &self.inner.next_tag.load(Ordering::Relaxed))
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl TagCorrelator {
    /// Empty correlator; the first tag is 1
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                next_tag: AtomicU64::new(1),
                next_seq: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Next tag, skipping any still pending.
    ///
    /// The returned tag is not reserved; use [`register_next`](Self::register_next)
    /// to allocate and register atomically.
    pub fn next_tag(&self) -> u64 {
        let pending = self.inner.pending.lock();
        self.allocate(&pending)
    }

    fn allocate(&self, pending: &HashMap<u64, PendingEntry>) -> u64 {
        loop {
            let tag = self.inner.next_tag.fetch_add(1, Ordering::Relaxed);
            if tag != 0 && !pending.contains_key(&tag) {
                return tag;
            }
        }
    }

    /// Register a waiter for `tag`.
    ///
    /// Returns `None` if the tag already has a waiter.
    pub fn register_pending(&self, tag: u64) -> Option<PendingHandle> {
        let mut pending = self.inner.pending.lock();
        if pending.contains_key(&tag) {
            return None;
        }
        Some(self.insert(&mut pending, tag))
    }

    /// Allocate a fresh tag and register a waiter for it.
    pub fn register_next(&self) -> PendingHandle {
        let mut pending = self.inner.pending.lock();
        let tag = self.allocate(&pending);
        self.insert(&mut pending, tag)
    }

    fn insert(&self, pending: &mut HashMap<u64, PendingEntry>, tag: u64) -> PendingHandle {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        pending.insert(tag, PendingEntry { seq, tx });
        debug!(tag, "registered pending request");
        PendingHandle {
            tag,
            seq,
            rx,
            owner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `outcome` to the waiter for `tag`.
    ///
    /// Fails with [`RpcError::UnmatchedTag`] when nobody is waiting, either
    /// because the tag was never registered or because its caller went away.
    pub fn resolve(&self, tag: u64, outcome: Outcome) -> RpcResult<()> {
        let entry = self.inner.pending.lock().remove(&tag);
        let Some(entry) = entry else {
            warn!(tag, "response for unknown tag");
            return Err(RpcError::UnmatchedTag(tag));
        };
        entry.tx.send(outcome).map_err(|_| {
            debug!(tag, "waiter dropped before its response arrived");
            RpcError::UnmatchedTag(tag)
        })
    }

    /// Whether `tag` has a waiter
    pub fn is_pending(&self, tag: u64) -> bool {
        self.inner.pending.lock().contains_key(&tag)
    }

    /// Number of waiters
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

/// A caller's claim on one tag
///
/// Dropping the handle releases the tag.
pub struct PendingHandle {
    tag: u64,
    seq: u64,
    rx: oneshot::Receiver<Outcome>,
    owner: std::sync::Weak<Inner>,
}

impl std::fmt::Debug for PendingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingHandle").field("tag", &self.tag).finish()
    }
}

impl PendingHandle {
    /// Tag this handle waits on
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Wait for the outcome routed to this tag.
    ///
    /// Yields [`RpcError::Cancelled`] if the resolving side went away.
    pub async fn wait(mut self) -> Outcome {
        match (&mut self.rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::Cancelled),
        }
    }

    /// Take the outcome if it has already arrived.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        let Some(inner) = self.owner.upgrade() else {
            return;
        };
        let mut pending = inner.pending.lock();
        // The tag may have been resolved and re-registered by someone else.
        if pending.get(&self.tag).is_some_and(|entry| entry.seq == self.seq) {
            pending.remove(&self.tag);
        }
    }
}
