//! Session lifecycle driving the route and field guards.

use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;
use vellum_access::testing::{CountingSource, GatedSource};
use vellum_access::{
    AccessSession, AuthEvent, AuthProvider, ElementPermissions, EvaluatorConfig, FieldGuard,
    FieldProps, FieldRender, GrantState, Identity, NavigationIntent, Navigator,
    PermissionEvaluator, PermissionKey, Role, RouteDecision, RouteGuard, RouteRequirement,
    StaticPermissionSource,
};
use vellum_common_config::RouteConfig;

#[derive(Default)]
struct RecordingNavigator {
    intents: Mutex<Vec<NavigationIntent>>,
}

impl RecordingNavigator {
    fn intents(&self) -> Vec<NavigationIntent> {
        self.intents.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, intent: NavigationIntent) {
        self.intents.lock().push(intent);
    }
}

fn crm_session() -> AccessSession {
    AccessSession::new(PermissionEvaluator::new(
        Arc::new(StaticPermissionSource::crm_defaults()),
        EvaluatorConfig::default(),
    ))
}

fn user(role: &str) -> Identity {
    Identity::new(Uuid::new_v4(), role).with_tenant("acme")
}

async fn settle(rx: &mut tokio::sync::watch::Receiver<RouteDecision>, expected: RouteDecision) {
    while *rx.borrow_and_update() != expected {
        rx.changed().await.unwrap();
    }
}

#[tokio::test]
async fn test_role_change_clears_cache_before_publishing() {
    let value = PermissionKey::parse("contract:field.value", "editable").unwrap();
    let source = Arc::new(CountingSource::new().with_answer("manager", value.clone(), true));
    let session = AccessSession::new(PermissionEvaluator::new(source.clone(), EvaluatorConfig::default()));

    let manager = user("manager");
    session.apply(AuthEvent::SessionRestored(Some(manager.clone())));
    assert!(session.evaluator().resolve(&manager, &value).await.granted());
    assert_eq!(session.evaluator().stats().size, 1);

    let mut states = session.subscribe_state();
    let viewer = Identity {
        role: Role::new("viewer"),
        ..manager.clone()
    };
    session.apply(AuthEvent::IdentityRefreshed(viewer.clone()));

    assert!(states.has_changed().unwrap());
    assert_eq!(states.borrow_and_update().user(), Some(&viewer));
    assert_eq!(session.evaluator().stats().size, 0);
    assert!(!session.evaluator().resolve(&viewer, &value).await.granted());
    assert_eq!(source.single_calls(), 2);
}

#[tokio::test]
async fn test_same_scope_refresh_keeps_cache() {
    let session = crm_session();
    let sales = user("sales");
    session.apply(AuthEvent::SignedIn(sales.clone()));
    session
        .evaluator()
        .resolve_permission(&sales, "deal:field.amount", "visible")
        .await
        .unwrap();

    session.apply(AuthEvent::IdentityRefreshed(sales.clone().with_email("new@acme.test")));
    assert_eq!(session.evaluator().stats().size, 1);
}

#[tokio::test]
async fn test_logout_clears_cache_and_denies() {
    let session = crm_session();
    let sales = user("sales");
    session.apply(AuthEvent::SignedIn(sales.clone()));
    session
        .evaluator()
        .resolve_permission(&sales, "deal:field.amount", "visible")
        .await
        .unwrap();

    session.apply(AuthEvent::LogoutStarted);
    assert_eq!(session.evaluator().stats().size, 0);
    assert!(session.state().is_loading());

    session.apply(AuthEvent::LogoutComplete);
    assert_eq!(
        session.check_permission("deal:field.amount", "visible"),
        GrantState::Denied
    );
    assert_eq!(session.element("deal:field.amount").snapshot(), ElementPermissions::DENIED);
}

#[tokio::test]
async fn test_logout_sequence_redirects_exactly_once() {
    let session = crm_session();
    session.apply(AuthEvent::SessionRestored(Some(user("sales"))));

    let navigator = Arc::new(RecordingNavigator::default());
    let guard = RouteGuard::new(
        RouteRequirement::new(),
        RouteConfig::default(),
        session.evaluator().clone(),
    );
    let (mut decisions, task) = guard.spawn(session.subscribe_state(), navigator.clone());
    settle(&mut decisions, RouteDecision::Allow).await;

    session.apply(AuthEvent::LogoutStarted);
    settle(&mut decisions, RouteDecision::Placeholder).await;
    assert!(navigator.intents().is_empty());

    session.apply(AuthEvent::LogoutComplete);
    settle(&mut decisions, RouteDecision::RedirectToLogin).await;

    // Stale restore attempts after logout must not bounce the user again.
    session.apply(AuthEvent::RestoreStarted);
    session.apply(AuthEvent::SessionRestored(None));
    settle(&mut decisions, RouteDecision::RedirectToLogin).await;

    session.teardown();
    task.await.unwrap();

    assert_eq!(
        navigator.intents(),
        vec![NavigationIntent::RedirectToLogin {
            path: "/login".to_string()
        }]
    );
}

#[tokio::test]
async fn test_route_waits_for_required_permission() {
    let deal = PermissionKey::parse("crm:deal", "delete").unwrap();
    let counting = Arc::new(CountingSource::new().with_answer("sales", deal.clone(), true));
    let gated = Arc::new(GatedSource::new(counting));
    let session = AccessSession::new(PermissionEvaluator::new(gated.clone(), EvaluatorConfig::default()));
    session.apply(AuthEvent::SignedIn(user("sales")));

    let guard = RouteGuard::new(
        RouteRequirement::new().with_permission(deal),
        RouteConfig::default(),
        session.evaluator().clone(),
    );
    let navigator = Arc::new(RecordingNavigator::default());
    let (mut decisions, _task) = guard.spawn(session.subscribe_state(), navigator.clone());

    while gated.waiting() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(*decisions.borrow(), RouteDecision::Placeholder);

    gated.release();
    settle(&mut decisions, RouteDecision::Allow).await;
    assert!(navigator.intents().is_empty());
}

#[tokio::test]
async fn test_field_renders_read_only_for_viewer() {
    let session = crm_session();
    session.apply(AuthEvent::SignedIn(user("viewer")));

    let mut handle = session.element("contract:field.value");
    let permissions = handle.settled().await;
    assert_eq!(
        permissions,
        ElementPermissions::new(GrantState::Granted, GrantState::Denied)
    );

    let guard = FieldGuard::new("contract:field.value").read_only_on_deny(true);
    let rendered = guard.render_handle(&handle, |props| props);
    assert_eq!(
        rendered,
        FieldRender::Field {
            node: FieldProps {
                read_only: true,
                disabled: true
            },
            props: FieldProps {
                read_only: true,
                disabled: true
            },
        }
    );
}

#[tokio::test]
async fn test_invisible_field_renders_fallback() {
    let session = crm_session();
    session.apply(AuthEvent::SignedIn(user("support")));

    let mut handle = session.element("deal:field.amount");
    handle.settled().await;

    let guard = FieldGuard::new("deal:field.amount").with_fallback("restricted");
    assert_eq!(
        guard.render_handle(&handle, |_| "input"),
        FieldRender::Fallback(Some("restricted"))
    );
}
