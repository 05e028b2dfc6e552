//! Route guard.
//!
//! Decides what a protected route shows for the current auth state. While
//! auth is loading the only possible decision is a placeholder: no allow,
//! no denial, no redirect. A redirect to login is issued once per signed-out
//! episode, so a logout cannot loop.

use crate::element::PermissionKey;
use crate::evaluator::PermissionEvaluator;
use crate::grant::GrantState;
use crate::identity::{Identity, Role};
use crate::session::{AuthProvider, AuthState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use vellum_common_config::{DenyBehavior, RouteConfig};

/// What a route demands of the signed-in user. Empty means any signed-in
/// user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequirement {
    /// Any one of these roles. Override roles always qualify.
    pub roles: Vec<Role>,
    /// Element permission resolved through the evaluator.
    pub permission: Option<PermissionKey>,
    /// Permission key the auth provider must have assigned to the user.
    pub permission_key: Option<String>,
}

impl RouteRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_permission(mut self, key: PermissionKey) -> Self {
        self.permission = Some(key);
        self
    }

    pub fn with_permission_key(mut self, key: impl Into<String>) -> Self {
        self.permission_key = Some(key.into());
        self
    }
}

/// Why an authenticated user was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenyReason {
    MissingRole { required: Vec<Role> },
    MissingPermission { key: String },
    MissingAssignedPermission { key: String },
}

/// What the route renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RouteDecision {
    /// Auth or the required permission is still loading.
    Placeholder,
    Allow,
    /// Signed in but not permitted. Rendered in place, not a redirect.
    AccessDenied { reason: DenyReason },
    RedirectToLogin,
}

/// Navigation requested by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationIntent {
    RedirectToLogin { path: String },
    RedirectToUnauthorized { path: String },
}

/// Router that carries out navigation intents.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn navigate(&self, intent: NavigationIntent);
}

/// Decision plus the navigation it triggers, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub decision: RouteDecision,
    pub navigation: Option<NavigationIntent>,
}

/// Guard for one route.
pub struct RouteGuard {
    requirement: RouteRequirement,
    routes: RouteConfig,
    evaluator: PermissionEvaluator,
    login_redirected: bool,
    denial_redirected: bool,
}

impl RouteGuard {
    pub fn new(requirement: RouteRequirement, routes: RouteConfig, evaluator: PermissionEvaluator) -> Self {
        Self {
            requirement,
            routes,
            evaluator,
            login_redirected: false,
            denial_redirected: false,
        }
    }

    pub fn requirement(&self) -> &RouteRequirement {
        &self.requirement
    }

    /// Decision for `auth`, without navigation bookkeeping.
    pub fn evaluate(&self, auth: &impl AuthProvider) -> RouteDecision {
        if auth.is_loading() {
            return RouteDecision::Placeholder;
        }
        let Some(user) = auth.user() else {
            return RouteDecision::RedirectToLogin;
        };
        self.authorize(user)
    }

    fn authorize(&self, user: &Identity) -> RouteDecision {
        let overrides = &self.evaluator.config().override_roles;
        let required = &self.requirement.roles;
        if !required.is_empty() && !required.contains(&user.role) && !overrides.contains(&user.role) {
            return RouteDecision::AccessDenied {
                reason: DenyReason::MissingRole {
                    required: required.clone(),
                },
            };
        }

        if let Some(key) = &self.requirement.permission_key {
            if !user.has_permission(key) {
                return RouteDecision::AccessDenied {
                    reason: DenyReason::MissingAssignedPermission { key: key.clone() },
                };
            }
        }

        if let Some(key) = &self.requirement.permission {
            match self.evaluator.check(user, key) {
                GrantState::Pending => return RouteDecision::Placeholder,
                GrantState::Denied => {
                    return RouteDecision::AccessDenied {
                        reason: DenyReason::MissingPermission { key: key.to_string() },
                    }
                }
                GrantState::Granted => {}
            }
        }

        RouteDecision::Allow
    }

    /// Feed a new auth state. Returns the decision and, at most once per
    /// episode, a navigation intent.
    pub fn on_state(&mut self, auth: &impl AuthProvider) -> GuardOutcome {
        let decision = self.evaluate(auth);
        let mut navigation = None;

        match &decision {
            RouteDecision::RedirectToLogin => {
                if !self.login_redirected {
                    self.login_redirected = true;
                    info!(path = %self.routes.login_path, "redirecting to login");
                    navigation = Some(NavigationIntent::RedirectToLogin {
                        path: self.routes.login_path.clone(),
                    });
                }
            }
            RouteDecision::AccessDenied { reason } => {
                debug!(reason = ?reason, "route access denied");
                if self.routes.deny_behavior == DenyBehavior::Redirect && !self.denial_redirected {
                    self.denial_redirected = true;
                    navigation = Some(NavigationIntent::RedirectToUnauthorized {
                        path: self.routes.unauthorized_path.clone(),
                    });
                }
            }
            RouteDecision::Allow => self.denial_redirected = false,
            RouteDecision::Placeholder => {}
        }

        // A new signed-in episode re-arms the login redirect.
        if auth.is_authenticated() {
            self.login_redirected = false;
        }

        GuardOutcome { decision, navigation }
    }

    /// Follow `auth` until it closes, publishing each decision and handing
    /// navigation intents to `navigator`.
    pub async fn run(
        mut self,
        mut auth: watch::Receiver<AuthState>,
        navigator: Arc<dyn Navigator>,
        decisions: watch::Sender<RouteDecision>,
    ) {
        loop {
            let state = auth.borrow_and_update().clone();
            let outcome = self.on_state(&state);
            if let Some(intent) = outcome.navigation {
                navigator.navigate(intent);
            }
            decisions.send_if_modified(|current| {
                let changed = *current != outcome.decision;
                *current = outcome.decision.clone();
                changed
            });

            let waiting_on = match (&outcome.decision, state.user(), &self.requirement.permission) {
                (RouteDecision::Placeholder, Some(user), Some(key)) => Some((user.clone(), key.clone())),
                _ => None,
            };

            match waiting_on {
                Some((user, key)) => {
                    let evaluator = self.evaluator.clone();
                    tokio::select! {
                        changed = auth.changed() => if changed.is_err() { break },
                        _ = evaluator.resolve(&user, &key) => {}
                    }
                }
                None => {
                    if auth.changed().await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("auth state closed, route guard stopped");
    }

    /// Run the guard on the current runtime.
    pub fn spawn(
        self,
        auth: watch::Receiver<AuthState>,
        navigator: Arc<dyn Navigator>,
    ) -> (watch::Receiver<RouteDecision>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(RouteDecision::Placeholder);
        let task = tokio::spawn(self.run(auth, navigator, tx));
        (rx, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::EvaluatorConfig;
    use crate::policy::StaticPermissionSource;
    use crate::session::AuthEvent;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn guard(requirement: RouteRequirement) -> RouteGuard {
        let evaluator = PermissionEvaluator::new(
            Arc::new(StaticPermissionSource::crm_defaults()),
            EvaluatorConfig::default(),
        );
        RouteGuard::new(requirement, RouteConfig::default(), evaluator)
    }

    fn sales() -> Identity {
        Identity::new(Uuid::new_v4(), "sales")
            .with_tenant("acme")
            .with_permission("crm:sales:deal:read")
    }

    #[test]
    fn test_loading_renders_placeholder() {
        let guard = guard(RouteRequirement::new());
        assert_eq!(guard.evaluate(&AuthState::restoring()), RouteDecision::Placeholder);

        let signing_out = AuthState::signed_in(sales()).apply(AuthEvent::LogoutStarted);
        assert_eq!(guard.evaluate(&signing_out), RouteDecision::Placeholder);
    }

    #[test]
    fn test_role_requirement() {
        let guard = guard(RouteRequirement::new().with_role("admin").with_role("manager"));

        assert!(matches!(
            guard.evaluate(&AuthState::signed_in(sales())),
            RouteDecision::AccessDenied {
                reason: DenyReason::MissingRole { .. }
            }
        ));

        let root = Identity::new(Uuid::new_v4(), Role::SUPER_ADMIN);
        assert_eq!(guard.evaluate(&AuthState::signed_in(root)), RouteDecision::Allow);
    }

    #[test]
    fn test_assigned_permission_key() {
        let allowed = guard(RouteRequirement::new().with_permission_key("crm:sales:deal:read"));
        assert_eq!(allowed.evaluate(&AuthState::signed_in(sales())), RouteDecision::Allow);

        let refused = guard(RouteRequirement::new().with_permission_key("crm:audit:read"));
        assert_eq!(
            refused.evaluate(&AuthState::signed_in(sales())),
            RouteDecision::AccessDenied {
                reason: DenyReason::MissingAssignedPermission {
                    key: "crm:audit:read".to_string()
                }
            }
        );
    }

    #[test]
    fn test_denial_redirect_behavior() {
        let evaluator = PermissionEvaluator::new(
            Arc::new(StaticPermissionSource::crm_defaults()),
            EvaluatorConfig::default(),
        );
        let routes = RouteConfig {
            deny_behavior: DenyBehavior::Redirect,
            ..RouteConfig::default()
        };
        let mut guard = RouteGuard::new(RouteRequirement::new().with_role("admin"), routes, evaluator);
        let state = AuthState::signed_in(sales());

        assert_eq!(
            guard.on_state(&state).navigation,
            Some(NavigationIntent::RedirectToUnauthorized {
                path: "/unauthorized".to_string()
            })
        );
        assert_eq!(guard.on_state(&state).navigation, None);
    }

    #[test]
    fn test_logout_redirects_once_after_completion() {
        let mut guard = guard(RouteRequirement::new());
        let signed_in = AuthState::signed_in(sales());
        let signing_out = signed_in.apply(AuthEvent::LogoutStarted);
        let signed_out = signing_out.apply(AuthEvent::LogoutComplete);

        let redirects: Vec<_> = [&signed_in, &signing_out, &signed_out, &signed_out]
            .into_iter()
            .filter_map(|state| guard.on_state(state).navigation)
            .collect();

        assert_eq!(
            redirects,
            vec![NavigationIntent::RedirectToLogin {
                path: "/login".to_string()
            }]
        );
    }

    fn arb_event() -> impl Strategy<Value = AuthEvent> {
        prop_oneof![
            Just(AuthEvent::RestoreStarted),
            Just(AuthEvent::SessionRestored(None)),
            Just(AuthEvent::SessionRestored(Some(sales()))),
            Just(AuthEvent::SignedIn(sales())),
            Just(AuthEvent::IdentityRefreshed(Identity::new(Uuid::nil(), "viewer").with_tenant("acme"))),
            Just(AuthEvent::LogoutStarted),
            Just(AuthEvent::LogoutComplete),
        ]
    }

    proptest! {
        #[test]
        fn never_redirects_while_loading(events in proptest::collection::vec(arb_event(), 0..32)) {
            let mut guard = guard(RouteRequirement::new());
            let mut state = AuthState::restoring();
            let mut redirected_this_episode = false;

            for event in events {
                state = state.apply(event);
                let outcome = guard.on_state(&state);

                if state.is_loading() {
                    prop_assert_eq!(&outcome.decision, &RouteDecision::Placeholder);
                    prop_assert!(outcome.navigation.is_none());
                }
                if state.is_authenticated() {
                    redirected_this_episode = false;
                }
                if outcome.navigation.is_some() {
                    prop_assert!(!redirected_this_episode, "second redirect in one signed-out episode");
                    redirected_this_episode = true;
                }
            }
        }
    }
}
