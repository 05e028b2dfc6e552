//! Per-element permission handle.

use crate::element::{Action, ElementPath, PermissionKey};
use crate::evaluator::PermissionEvaluator;
use crate::grant::GrantState;
use crate::identity::Identity;
use crate::subscription::Subscription;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// `visible` and `editable` grants for one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElementPermissions {
    pub visible: GrantState,
    pub editable: GrantState,
}

impl ElementPermissions {
    pub const PENDING: Self = Self {
        visible: GrantState::Pending,
        editable: GrantState::Pending,
    };

    pub const DENIED: Self = Self {
        visible: GrantState::Denied,
        editable: GrantState::Denied,
    };

    pub fn new(visible: GrantState, editable: GrantState) -> Self {
        Self { visible, editable }
    }

    pub fn is_pending(&self) -> bool {
        self.visible.is_pending() || self.editable.is_pending()
    }
}

/// Live view of one element's grants.
///
/// Holds subscriptions for both actions; dropping the handle detaches them
/// without cancelling the fetches.
#[derive(Debug)]
pub struct ElementHandle {
    element: String,
    visible: watch::Receiver<GrantState>,
    editable: watch::Receiver<GrantState>,
    _subscriptions: Vec<Subscription>,
}

impl ElementHandle {
    pub(crate) fn watch(evaluator: &PermissionEvaluator, identity: &Identity, path: ElementPath) -> Self {
        let element = path.to_string();
        let (visible, visible_sub) = track(evaluator, identity, PermissionKey::new(path.clone(), Action::Visible));
        let (editable, editable_sub) = track(evaluator, identity, PermissionKey::new(path, Action::Editable));

        Self {
            element,
            visible,
            editable,
            _subscriptions: vec![visible_sub, editable_sub],
        }
    }

    pub(crate) fn denied(element: &str) -> Self {
        let (_, visible) = watch::channel(GrantState::Denied);
        let (_, editable) = watch::channel(GrantState::Denied);
        Self {
            element: element.to_string(),
            visible,
            editable,
            _subscriptions: Vec::new(),
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn snapshot(&self) -> ElementPermissions {
        ElementPermissions {
            visible: *self.visible.borrow(),
            editable: *self.editable.borrow(),
        }
    }

    /// Wait until either grant changes. Returns `false` once no further
    /// change can arrive.
    pub async fn changed(&mut self) -> bool {
        tokio::select! {
            visible = self.visible.changed() => visible.is_ok(),
            editable = self.editable.changed() => editable.is_ok(),
        }
    }

    /// Wait until neither grant is pending.
    pub async fn settled(&mut self) -> ElementPermissions {
        loop {
            let snapshot = self.snapshot();
            if !snapshot.is_pending() || !self.changed().await {
                return snapshot;
            }
        }
    }
}

/// Subscribe before checking so a fetch settling in between is not missed.
fn track(
    evaluator: &PermissionEvaluator,
    identity: &Identity,
    key: PermissionKey,
) -> (watch::Receiver<GrantState>, Subscription) {
    let (tx, rx) = watch::channel(GrantState::Pending);
    let tx = Arc::new(tx);

    let notify = Arc::clone(&tx);
    let subscription = evaluator.subscribe(identity, &key, move |state| {
        notify.send_replace(state);
    });

    let initial = evaluator.check(identity, &key);
    if !initial.is_pending() {
        tx.send_if_modified(|current| {
            let update = current.is_pending();
            if update {
                *current = initial;
            }
            update
        });
    }

    (rx, subscription)
}
