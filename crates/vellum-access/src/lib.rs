//! Vellum access layer
//!
//! Element-level permission evaluation for a multi-tenant CRM.
//!
//! # Architecture
//!
//! - **Sources**: where permission records live ([`RestPermissionSource`],
//!   [`StaticPermissionSource`])
//! - **Evaluator**: cache, request coalescing and the override-role
//!   fallback ([`PermissionEvaluator`])
//! - **Session**: auth state machine owning the evaluator's lifetime
//!   ([`AccessSession`])
//! - **Guards**: route and field decisions derived from the above
//!   ([`RouteGuard`], [`FieldGuard`])
//!
//! # Features
//!
//! - `test-utils` - permission source doubles in [`testing`]

#![warn(clippy::all)]

pub mod audit;
pub mod cache;
pub mod element;
pub mod error;
pub mod evaluator;
pub mod field_guard;
pub mod grant;
pub mod handle;
pub mod identity;
pub mod policy;
pub mod rest;
pub mod route_guard;
pub mod session;
pub mod source;
pub mod subscription;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{CacheKey, CacheStats, PermissionCache};
pub use element::{Action, ElementPath, PermissionKey};
pub use error::{AccessError, SourceError, SourceResult};
pub use evaluator::{EvaluatorConfig, PermissionEvaluator};
pub use field_guard::{field_access, FieldAccess, FieldGuard, FieldProps, FieldRender};
pub use grant::{Fault, GrantState, Resolution};
pub use handle::{ElementHandle, ElementPermissions};
pub use identity::{AccessScope, Identity, Role, SessionClaims, TenantId};
pub use policy::{PermissionRecord, RoleGrants, StaticPermissionSource};
pub use rest::RestPermissionSource;
pub use route_guard::{
    DenyReason, GuardOutcome, NavigationIntent, Navigator, RouteDecision, RouteGuard,
    RouteRequirement,
};
pub use session::{AccessSession, AuthEvent, AuthPhase, AuthProvider, AuthState};
pub use source::PermissionSource;
pub use subscription::Subscription;
