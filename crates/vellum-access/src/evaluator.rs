//! Permission evaluator.
//!
//! Resolves `(identity, element path, action)` to a grant. Answers come from
//! the cache when settled; otherwise one fetch per key is issued to the
//! permission source and shared by every caller asking before it settles.
//! A missing record falls back to the override-role rule: override roles
//! are granted, everyone else is denied.

use crate::audit;
use crate::cache::{CacheKey, CacheStats, Claim, PermissionCache, SharedFetch};
use crate::element::{Action, ElementPath, PermissionKey};
use crate::error::AccessError;
use crate::grant::{Fault, GrantState, Resolution};
use crate::handle::ElementHandle;
use crate::identity::{AccessScope, Identity, Role};
use crate::source::PermissionSource;
use crate::subscription::{SubscriberHub, Subscription};
use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn, Instrument};
use vellum_common_config::AccessConfig;
use vellum_common_log::spans::{fetch_span, prefetch_span};

type SourceOutcome = Result<Option<bool>, Fault>;
type BulkFetch = Shared<BoxFuture<'static, Result<Arc<HashMap<PermissionKey, bool>>, Fault>>>;

/// Evaluator settings.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Roles granted whenever the source has no record.
    pub override_roles: HashSet<Role>,
    /// Per-fetch timeout. A timed out fetch resolves denied.
    pub fetch_timeout: Duration,
    /// Emit an audit event per settled decision.
    pub audit_decisions: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from(&AccessConfig::default())
    }
}

impl From<&AccessConfig> for EvaluatorConfig {
    fn from(config: &AccessConfig) -> Self {
        Self {
            override_roles: config.override_roles.iter().map(Role::new).collect(),
            fetch_timeout: config.fetch_timeout(),
            audit_decisions: config.audit_decisions,
        }
    }
}

/// Permission evaluator. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct PermissionEvaluator {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn PermissionSource>,
    cache: PermissionCache,
    hub: Arc<SubscriberHub>,
    config: EvaluatorConfig,
}

impl PermissionEvaluator {
    pub fn new(source: Arc<dyn PermissionSource>, config: EvaluatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                cache: PermissionCache::new(),
                hub: Arc::new(SubscriberHub::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.inner.config
    }

    /// Check a raw element path.
    ///
    /// Returns immediately: `Pending` while the answer is being fetched. A
    /// malformed path or action is a caller bug and resolves `Denied`.
    pub fn check_permission(
        &self,
        identity: &Identity,
        element_path: &str,
        action: impl Into<Action>,
    ) -> GrantState {
        match PermissionKey::parse(element_path, action) {
            Ok(key) => self.check(identity, &key),
            Err(err) => {
                warn!(error = %err, "denying malformed permission key");
                GrantState::Denied
            }
        }
    }

    /// Check a key, starting a fetch in the background on a miss.
    pub fn check(&self, identity: &Identity, key: &PermissionKey) -> GrantState {
        match self.claim(identity, key) {
            Claim::Resolved(resolution) => resolution.state(),
            Claim::Pending { fetch, started } => {
                if started {
                    drive(fetch);
                }
                GrantState::Pending
            }
        }
    }

    /// State of a key without starting a fetch.
    pub fn peek(&self, identity: &Identity, key: &PermissionKey) -> Option<GrantState> {
        self.inner.cache.state(&cache_key(identity, key))
    }

    /// Resolve a key, waiting for the fetch if needed.
    ///
    /// Dropping the returned future does not cancel a fetch other callers
    /// may be waiting on.
    pub async fn resolve(&self, identity: &Identity, key: &PermissionKey) -> Resolution {
        match self.claim(identity, key) {
            Claim::Resolved(resolution) => resolution,
            Claim::Pending { fetch, started } => {
                if started {
                    drive(fetch.clone());
                }
                fetch.await
            }
        }
    }

    /// Resolve a raw element path.
    pub async fn resolve_permission(
        &self,
        identity: &Identity,
        element_path: &str,
        action: impl Into<Action>,
    ) -> Result<Resolution, AccessError> {
        let key = PermissionKey::parse(element_path, action)?;
        Ok(self.resolve(identity, &key).await)
    }

    /// Pre-warm a page: resolve every key, fetching all missing ones in a
    /// single bulk round trip.
    ///
    /// Keys already cached or in flight are not fetched again. Keys the
    /// source omits resolve through the role fallback.
    pub async fn prefetch(
        &self,
        identity: &Identity,
        keys: &[PermissionKey],
    ) -> Vec<(PermissionKey, Resolution)> {
        let scope = identity.scope();
        let (keys_tx, keys_rx) = oneshot::channel::<Vec<PermissionKey>>();
        let bulk: BulkFetch = {
            let inner = Arc::clone(&self.inner);
            let scope = scope.clone();
            async move {
                let keys = keys_rx.await.unwrap_or_default();
                let span = prefetch_span(keys.len());
                inner.fetch_bulk(&scope, &keys).instrument(span).await
            }
            .boxed()
            .shared()
        };

        let mut claimed = Vec::new();
        let mut waiting = Vec::with_capacity(keys.len());
        for key in keys {
            let claim = self.inner.cache.claim(&CacheKey::new(scope.clone(), key.clone()), |ticket| {
                claimed.push(key.clone());
                Inner::settle_from_bulk(&self.inner, identity.clone(), key.clone(), ticket, bulk.clone())
            });
            waiting.push((key.clone(), claim));
        }

        debug!(
            scope = %scope,
            requested = keys.len(),
            fetching = claimed.len(),
            "prefetching permissions"
        );
        // The bulk future only learns its key set here, after every claim is
        // installed, so an early poll from a joined caller cannot truncate it.
        let _ = keys_tx.send(claimed);

        let settled = waiting.into_iter().map(|(key, claim)| async move {
            let resolution = match claim {
                Claim::Resolved(resolution) => resolution,
                Claim::Pending { fetch, started } => {
                    if started {
                        drive(fetch.clone());
                    }
                    fetch.await
                }
            };
            (key, resolution)
        });
        future::join_all(settled).await
    }

    /// Re-issue a key whose last resolution was a fault.
    ///
    /// A clean resolution is never replaced; it is returned as is.
    pub async fn retry(&self, identity: &Identity, key: &PermissionKey) -> Resolution {
        if self.inner.cache.forget_faulted(&cache_key(identity, key)) {
            debug!(scope = %identity.scope(), key = %key, "retrying faulted permission");
        }
        self.resolve(identity, key).await
    }

    /// Register `callback` for settled changes to a key.
    ///
    /// The callback fires with the resolved state each time a fetch for the
    /// key settles under the identity's scope. It does not start a fetch.
    pub fn subscribe<F>(&self, identity: &Identity, key: &PermissionKey, callback: F) -> Subscription
    where
        F: Fn(GrantState) + Send + Sync + 'static,
    {
        self.inner
            .hub
            .subscribe(cache_key(identity, key), Arc::new(callback))
    }

    /// Track `visible` and `editable` for one element.
    pub fn element(&self, identity: &Identity, element_path: &str) -> ElementHandle {
        match ElementPath::parse(element_path) {
            Ok(path) => ElementHandle::watch(self, identity, path),
            Err(err) => {
                warn!(error = %err, "denying malformed element path");
                ElementHandle::denied(element_path)
            }
        }
    }

    /// Drop every cached grant. Fetches in flight can no longer write back.
    pub fn clear(&self) {
        self.inner.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    fn claim(&self, identity: &Identity, key: &PermissionKey) -> Claim {
        self.inner.cache.claim(&cache_key(identity, key), |ticket| {
            Inner::start_fetch(&self.inner, identity.clone(), key.clone(), ticket)
        })
    }
}

impl Inner {
    fn start_fetch(this: &Arc<Self>, identity: Identity, key: PermissionKey, ticket: u64) -> SharedFetch {
        let inner = Arc::clone(this);
        async move {
            let scope = identity.scope();
            let span = fetch_span(key.element.as_str(), key.action.as_str());
            let outcome = inner.fetch_single(&scope, &key).instrument(span).await;
            inner.settle(&identity, CacheKey::new(scope, key), ticket, outcome)
        }
        .boxed()
        .shared()
    }

    fn settle_from_bulk(
        this: &Arc<Self>,
        identity: Identity,
        key: PermissionKey,
        ticket: u64,
        bulk: BulkFetch,
    ) -> SharedFetch {
        let inner = Arc::clone(this);
        async move {
            let outcome = bulk.await.map(|found| found.get(&key).copied());
            inner.settle(&identity, CacheKey::new(identity.scope(), key), ticket, outcome)
        }
        .boxed()
        .shared()
    }

    async fn fetch_single(&self, scope: &AccessScope, key: &PermissionKey) -> SourceOutcome {
        self.cache.record_fetch();
        let fetch = self.source.fetch_permission(scope, key);
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(found)) => Ok(found),
            Ok(Err(err)) => {
                let err = AccessError::from(err);
                warn!(scope = %scope, key = %key, error = %err, "permission fetch failed");
                Err(Fault::FetchFailure)
            }
            Err(_) => {
                let err = AccessError::Timeout {
                    after: self.config.fetch_timeout,
                };
                warn!(scope = %scope, key = %key, error = %err, "permission fetch timed out");
                Err(Fault::Timeout)
            }
        }
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> Result<Arc<HashMap<PermissionKey, bool>>, Fault> {
        if keys.is_empty() {
            return Ok(Arc::new(HashMap::new()));
        }
        self.cache.record_fetch();
        let fetch = self.source.fetch_bulk(scope, keys);
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(found)) => Ok(Arc::new(found)),
            Ok(Err(err)) => {
                let err = AccessError::from(err);
                warn!(scope = %scope, keys = keys.len(), error = %err, "bulk permission fetch failed");
                Err(Fault::FetchFailure)
            }
            Err(_) => {
                let err = AccessError::Timeout {
                    after: self.config.fetch_timeout,
                };
                warn!(scope = %scope, keys = keys.len(), error = %err, "bulk permission fetch timed out");
                Err(Fault::Timeout)
            }
        }
    }

    fn decide(&self, role: &Role, outcome: SourceOutcome) -> Resolution {
        match outcome {
            Ok(Some(granted)) => Resolution::Explicit { granted },
            Ok(None) => Resolution::Fallback {
                granted: self.config.override_roles.contains(role),
            },
            Err(fault) => Resolution::Faulted { fault },
        }
    }

    fn settle(&self, identity: &Identity, key: CacheKey, ticket: u64, outcome: SourceOutcome) -> Resolution {
        let resolution = self.decide(&identity.role, outcome);
        if self.cache.complete(&key, ticket, resolution) {
            if self.config.audit_decisions {
                audit::log_decision(identity, &key.key, resolution);
            }
            self.hub.notify(&key, resolution.state());
        } else {
            debug!(scope = %key.scope, key = %key.key, "discarding result for a superseded identity");
        }
        resolution
    }
}

fn cache_key(identity: &Identity, key: &PermissionKey) -> CacheKey {
    CacheKey::new(identity.scope(), key.clone())
}

/// Poll a freshly installed fetch to completion on the current runtime.
///
/// Without a runtime the fetch stays pending until some caller awaits it.
fn drive(fetch: SharedFetch) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fetch);
        }
        Err(_) => debug!("no async runtime; permission fetch deferred until awaited"),
    }
}
