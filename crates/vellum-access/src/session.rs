//! Session context.
//!
//! [`AccessSession`] owns the authentication state machine and the
//! evaluator for one signed-in lifetime. Guards read the published
//! [`AuthState`]; nothing in this crate keeps identity in a global.

use crate::element::Action;
use crate::evaluator::PermissionEvaluator;
use crate::grant::GrantState;
use crate::handle::ElementHandle;
use crate::identity::{Identity, SessionClaims};
use tokio::sync::watch;
use tracing::{debug, info};
use vellum_common_log::spans::session_span;

/// Authentication lifecycle.
///
/// `Restoring` and `SigningOut` are loading phases. `SigningOut` is left
/// only through [`AuthEvent::LogoutComplete`], so no observer ever sees a
/// signed-out state while the provider is still tearing the session down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPhase {
    Restoring,
    SignedIn(Identity),
    SigningOut,
    SignedOut,
}

/// Events reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A stored session is being restored.
    RestoreStarted,
    /// Restore finished, with the restored identity if any.
    SessionRestored(Option<Identity>),
    /// Interactive sign-in succeeded.
    SignedIn(Identity),
    /// The provider reissued the identity, e.g. after a role change.
    IdentityRefreshed(Identity),
    /// Sign-out was requested.
    LogoutStarted,
    /// The provider finished signing out.
    LogoutComplete,
}

impl AuthEvent {
    /// Restore result from decoded token claims. Invalid or expired claims
    /// restore to signed out.
    pub fn restored_from_claims(claims: Option<SessionClaims>) -> Self {
        Self::SessionRestored(claims.and_then(SessionClaims::into_identity))
    }
}

/// Read-only view of authentication consumed by guards.
pub trait AuthProvider {
    fn is_loading(&self) -> bool;

    fn user(&self) -> Option<&Identity>;

    fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    fn has_role(&self, role: &str) -> bool {
        self.user().is_some_and(|user| user.has_role(role))
    }

    fn has_permission(&self, key: &str) -> bool {
        self.user().is_some_and(|user| user.has_permission(key))
    }
}

/// Authentication state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    phase: AuthPhase,
}

impl AuthState {
    pub fn restoring() -> Self {
        Self {
            phase: AuthPhase::Restoring,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            phase: AuthPhase::SignedIn(identity),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            phase: AuthPhase::SignedOut,
        }
    }

    pub fn phase(&self) -> &AuthPhase {
        &self.phase
    }

    /// Apply a provider event. Events that make no sense in the current
    /// phase are ignored.
    pub fn apply(&self, event: AuthEvent) -> AuthState {
        use AuthPhase::*;

        let phase = match (&self.phase, event) {
            (SignedOut, AuthEvent::RestoreStarted) => Restoring,
            (Restoring, AuthEvent::SessionRestored(Some(identity))) => SignedIn(identity),
            (Restoring, AuthEvent::SessionRestored(None)) => SignedOut,
            (Restoring | SignedOut | SignedIn(_), AuthEvent::SignedIn(identity)) => SignedIn(identity),
            (SignedIn(_), AuthEvent::IdentityRefreshed(identity)) => SignedIn(identity),
            (Restoring | SignedIn(_), AuthEvent::LogoutStarted) => SigningOut,
            (SigningOut, AuthEvent::LogoutComplete) => SignedOut,
            (phase, event) => {
                debug!(phase = ?phase, event = ?event, "ignoring auth event");
                phase.clone()
            }
        };

        Self { phase }
    }

    /// Whether the state is final enough for a guard to act on.
    pub fn is_settled(&self) -> bool {
        !self.is_loading()
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::restoring()
    }
}

impl AuthProvider for AuthState {
    fn is_loading(&self) -> bool {
        matches!(self.phase, AuthPhase::Restoring | AuthPhase::SigningOut)
    }

    fn user(&self) -> Option<&Identity> {
        match &self.phase {
            AuthPhase::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Session context: auth state plus the evaluator whose cache belongs to it.
pub struct AccessSession {
    state: watch::Sender<AuthState>,
    evaluator: PermissionEvaluator,
}

impl AccessSession {
    /// Start a session in the restoring phase.
    pub fn new(evaluator: PermissionEvaluator) -> Self {
        let (state, _) = watch::channel(AuthState::restoring());
        Self { state, evaluator }
    }

    pub fn evaluator(&self) -> &PermissionEvaluator {
        &self.evaluator
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receive every published state.
    pub fn subscribe_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Apply a provider event and publish the resulting state.
    ///
    /// When the tenant or role changes, or the user signs out, the cache is
    /// cleared before the new state is visible to any observer.
    pub fn apply(&self, event: AuthEvent) -> AuthState {
        self.state.send_if_modified(|current| {
            let next = current.apply(event);
            if next == *current {
                return false;
            }
            self.on_transition(current, &next);
            *current = next;
            true
        });
        self.state()
    }

    fn on_transition(&self, previous: &AuthState, next: &AuthState) {
        match (previous.user(), next.user()) {
            (Some(old), Some(new)) if old.changes_scope(new) => {
                let _span = identity_span(new).entered();
                info!(
                    previous_role = %old.role,
                    previous_tenant = ?old.tenant_id,
                    "identity scope changed, clearing permission cache"
                );
                self.evaluator.clear();
            }
            (Some(old), None) => {
                info!(user = %old.user_id, "session ended, clearing permission cache");
                self.evaluator.clear();
            }
            (None, Some(new)) => {
                let _span = identity_span(new).entered();
                info!("session started");
            }
            _ => {}
        }
    }

    /// Check a permission for the signed-in user. Denied without one.
    pub fn check_permission(&self, element_path: &str, action: impl Into<Action>) -> GrantState {
        let identity = self.state.borrow().user().cloned();
        match identity {
            Some(identity) => self.evaluator.check_permission(&identity, element_path, action),
            None => {
                debug!(element = element_path, "no identity, denying");
                GrantState::Denied
            }
        }
    }

    /// Track an element for the signed-in user. Denied without one.
    pub fn element(&self, element_path: &str) -> ElementHandle {
        let identity = self.state.borrow().user().cloned();
        match identity {
            Some(identity) => self.evaluator.element(&identity, element_path),
            None => ElementHandle::denied(element_path),
        }
    }

    /// End the session: drop every cached grant and publish signed out.
    pub fn teardown(self) {
        self.evaluator.clear();
        self.state.send_replace(AuthState::signed_out());
        info!("access session torn down");
    }
}

fn identity_span(identity: &Identity) -> tracing::Span {
    session_span(
        &identity.user_id.to_string(),
        identity.tenant_id.as_ref().map(|t| t.as_str()),
        identity.role.as_str(),
    )
}
