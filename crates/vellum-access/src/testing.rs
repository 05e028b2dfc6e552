//! Permission source doubles for tests.

use crate::element::PermissionKey;
use crate::error::{SourceError, SourceResult};
use crate::identity::AccessScope;
use crate::source::PermissionSource;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Answers from a fixed table and counts every round trip.
///
/// The table is keyed by role name and permission key; keys without an
/// entry answer "no record".
#[derive(Default)]
pub struct CountingSource {
    answers: Mutex<HashMap<(String, PermissionKey), bool>>,
    single_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(self, role: &str, key: PermissionKey, granted: bool) -> Self {
        self.set_answer(role, key, granted);
        self
    }

    pub fn set_answer(&self, role: &str, key: PermissionKey, granted: bool) {
        self.answers.lock().insert((role.to_string(), key), granted);
    }

    /// Single-key fetches issued so far.
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    /// Bulk fetches issued so far.
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::SeqCst)
    }

    fn answer(&self, scope: &AccessScope, key: &PermissionKey) -> Option<bool> {
        self.answers
            .lock()
            .get(&(scope.role.to_string(), key.clone()))
            .copied()
    }
}

#[async_trait]
impl PermissionSource for CountingSource {
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer(scope, key))
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys
            .iter()
            .filter_map(|key| self.answer(scope, key).map(|granted| (key.clone(), granted)))
            .collect())
    }
}

/// Wraps a source and holds every fetch open until released.
pub struct GatedSource<S> {
    inner: S,
    gate: Arc<Notify>,
    open: Mutex<bool>,
    waiting: AtomicUsize,
}

impl<S: PermissionSource> GatedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            gate: Arc::new(Notify::new()),
            open: Mutex::new(false),
            waiting: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Let every held and future fetch through.
    pub fn release(&self) {
        *self.open.lock() = true;
        self.gate.notify_waiters();
    }

    /// Fetches currently held at the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        loop {
            let notified = self.gate.notified();
            if *self.open.lock() {
                return;
            }
            self.waiting.fetch_add(1, Ordering::SeqCst);
            notified.await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<S: PermissionSource> PermissionSource for GatedSource<S> {
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        self.pass().await;
        self.inner.fetch_permission(scope, key).await
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        self.pass().await;
        self.inner.fetch_bulk(scope, keys).await
    }
}

/// Fails every fetch with a backend error.
#[derive(Debug, Default)]
pub struct FailingSource;

#[async_trait]
impl PermissionSource for FailingSource {
    async fn fetch_permission(
        &self,
        _scope: &AccessScope,
        _key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        Err(SourceError::Backend {
            message: "permission backend unavailable".to_string(),
        })
    }
}
