//! Per-session permission cache.
//!
//! Each key holds either an in-flight fetch, shared by every caller that
//! asks before it settles, or the settled [`Resolution`]. Settled entries
//! never change until the cache is cleared, except faulted ones which
//! [`PermissionCache::forget_faulted`] may drop for a retry.

use crate::element::PermissionKey;
use crate::grant::{GrantState, Resolution};
use crate::identity::AccessScope;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-flight fetch, clonable so every waiter polls the same work.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Resolution>>;

/// Cache key: a permission key resolved for one tenant and role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: AccessScope,
    pub key: PermissionKey,
}

impl CacheKey {
    pub fn new(scope: AccessScope, key: PermissionKey) -> Self {
        Self { scope, key }
    }
}

enum Slot {
    Pending { ticket: u64, fetch: SharedFetch },
    Resolved(Resolution),
}

/// Outcome of [`PermissionCache::claim`].
pub(crate) enum Claim {
    Resolved(Resolution),
    Pending {
        fetch: SharedFetch,
        /// This call installed the fetch and is responsible for driving it.
        started: bool,
    },
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from a settled entry.
    pub hits: u64,
    /// Lookups that had to start a fetch.
    pub misses: u64,
    /// Lookups that joined a fetch already in flight.
    pub coalesced: u64,
    /// Round trips issued to the permission source.
    pub fetches: u64,
    /// Entries currently cached, pending ones included.
    pub size: usize,
}

#[derive(Default)]
struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
}

/// Permission cache shared by one evaluator.
#[derive(Default)]
pub struct PermissionCache {
    entries: DashMap<CacheKey, Slot>,
    next_ticket: AtomicU64,
    stats: CacheStatsInner,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a key without starting anything.
    pub fn state(&self, key: &CacheKey) -> Option<GrantState> {
        self.entries.get(key).map(|slot| match slot.value() {
            Slot::Pending { .. } => GrantState::Pending,
            Slot::Resolved(resolution) => resolution.state(),
        })
    }

    /// Settled resolution for a key, if any.
    pub fn resolution(&self, key: &CacheKey) -> Option<Resolution> {
        self.entries.get(key).and_then(|slot| match slot.value() {
            Slot::Resolved(resolution) => Some(*resolution),
            Slot::Pending { .. } => None,
        })
    }

    /// Return the cached answer, join the fetch in flight, or install the
    /// fetch built by `start`.
    ///
    /// The check and the insert happen under one shard lock, so concurrent
    /// claims for a key produce exactly one fetch. `start` receives the
    /// ticket the fetch must present to [`complete`](Self::complete); it
    /// must only build the future, not poll it.
    pub(crate) fn claim(&self, key: &CacheKey, start: impl FnOnce(u64) -> SharedFetch) -> Claim {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Resolved(resolution) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(scope = %key.scope, key = %key.key, "permission cache hit");
                    Claim::Resolved(*resolution)
                }
                Slot::Pending { fetch, .. } => {
                    self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(scope = %key.scope, key = %key.key, "joining in-flight permission fetch");
                    Claim::Pending {
                        fetch: fetch.clone(),
                        started: false,
                    }
                }
            },
            Entry::Vacant(entry) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(scope = %key.scope, key = %key.key, "permission cache miss");
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let fetch = start(ticket);
                entry.insert(Slot::Pending {
                    ticket,
                    fetch: fetch.clone(),
                });
                Claim::Pending {
                    fetch,
                    started: true,
                }
            }
        }
    }

    /// Settle the fetch holding `ticket`.
    ///
    /// Returns `false` when the slot was cleared or replaced since the fetch
    /// started; the result then belongs to a previous identity and is
    /// dropped.
    pub(crate) fn complete(&self, key: &CacheKey, ticket: u64, resolution: Resolution) -> bool {
        let Some(mut slot) = self.entries.get_mut(key) else {
            return false;
        };
        let current = matches!(slot.value(), Slot::Pending { ticket: t, .. } if *t == ticket);
        if current {
            *slot = Slot::Resolved(resolution);
        }
        current
    }

    /// Drop a faulted entry so the next claim fetches again.
    pub fn forget_faulted(&self, key: &CacheKey) -> bool {
        self.entries
            .remove_if(key, |_, slot| matches!(slot, Slot::Resolved(r) if r.is_faulted()))
            .is_some()
    }

    pub(crate) fn record_fetch(&self) {
        self.stats.fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every entry. In-flight fetches keep running but can no longer
    /// write back.
    pub fn clear(&self) {
        let size = self.entries.len();
        self.entries.clear();
        debug!(entries = size, "permission cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            coalesced: self.stats.coalesced.load(Ordering::Relaxed),
            fetches: self.stats.fetches.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::Fault;
    use crate::identity::Role;
    use futures::FutureExt;

    fn key(role: &str) -> CacheKey {
        CacheKey::new(
            AccessScope {
                tenant: None,
                role: Role::new(role),
            },
            PermissionKey::parse("deal:field.amount", "visible").unwrap(),
        )
    }

    fn ready(resolution: Resolution) -> SharedFetch {
        async move { resolution }.boxed().shared()
    }

    #[test]
    fn test_claim_installs_once() {
        let cache = PermissionCache::new();
        let key = key("sales");

        let first = cache.claim(&key, |_| ready(Resolution::Explicit { granted: true }));
        assert!(matches!(first, Claim::Pending { started: true, .. }));

        let second = cache.claim(&key, |_| panic!("second claim must join"));
        assert!(matches!(second, Claim::Pending { started: false, .. }));
        assert_eq!(cache.state(&key), Some(GrantState::Pending));

        let stats = cache.stats();
        assert_eq!((stats.misses, stats.coalesced, stats.size), (1, 1, 1));
    }

    #[test]
    fn test_complete_then_hit() {
        let cache = PermissionCache::new();
        let key = key("sales");
        let mut issued = None;
        cache.claim(&key, |ticket| {
            issued = Some(ticket);
            ready(Resolution::Explicit { granted: true })
        });

        assert!(cache.complete(&key, issued.unwrap(), Resolution::Explicit { granted: true }));
        assert!(matches!(
            cache.claim(&key, |_| panic!("resolved entry must not refetch")),
            Claim::Resolved(Resolution::Explicit { granted: true })
        ));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let cache = PermissionCache::new();
        let key = key("sales");
        let mut old = None;
        cache.claim(&key, |ticket| {
            old = Some(ticket);
            ready(Resolution::Explicit { granted: true })
        });

        cache.clear();
        assert!(!cache.complete(&key, old.unwrap(), Resolution::Explicit { granted: true }));
        assert!(cache.is_empty());

        let mut fresh = None;
        cache.claim(&key, |ticket| {
            fresh = Some(ticket);
            ready(Resolution::Explicit { granted: false })
        });
        assert!(!cache.complete(&key, old.unwrap(), Resolution::Explicit { granted: true }));
        assert_eq!(cache.state(&key), Some(GrantState::Pending));
        assert!(cache.complete(&key, fresh.unwrap(), Resolution::Explicit { granted: false }));
        assert_eq!(cache.state(&key), Some(GrantState::Denied));
    }

    #[test]
    fn test_forget_faulted_only() {
        let cache = PermissionCache::new();
        let faulted = key("sales");
        let clean = key("viewer");

        for (key, resolution) in [
            (&faulted, Resolution::Faulted { fault: Fault::Timeout }),
            (&clean, Resolution::Explicit { granted: false }),
        ] {
            let mut issued = 0;
            cache.claim(key, |ticket| {
                issued = ticket;
                ready(resolution)
            });
            cache.complete(key, issued, resolution);
        }

        assert!(!cache.forget_faulted(&clean));
        assert!(cache.forget_faulted(&faulted));
        assert_eq!(cache.state(&faulted), None);
        assert_eq!(cache.resolution(&clean), Some(Resolution::Explicit { granted: false }));
    }
}
