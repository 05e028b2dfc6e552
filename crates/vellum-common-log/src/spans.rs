//! Span helpers for the access layer.

use tracing::{debug_span, info_span, Span};

/// Span covering one authenticated session.
pub fn session_span(user_id: &str, tenant: Option<&str>, role: &str) -> Span {
    info_span!(
        "session",
        user = %user_id,
        tenant = tenant.unwrap_or("*"),
        role = %role,
    )
}

/// Span covering a single permission-source round trip.
pub fn fetch_span(element: &str, action: &str) -> Span {
    debug_span!("permission_fetch", element = %element, action = %action)
}

/// Span covering a bulk pre-warm round trip.
pub fn prefetch_span(keys: usize) -> Span {
    debug_span!("permission_prefetch", keys = keys)
}
