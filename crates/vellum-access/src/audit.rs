//! Access decision audit logging.

use crate::element::PermissionKey;
use crate::grant::Resolution;
use crate::identity::Identity;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Access decision audit event.
#[derive(Debug, Serialize)]
pub struct AccessAuditEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: Uuid,
    pub tenant: Option<String>,
    pub role: String,
    pub element: String,
    pub action: String,
    pub granted: bool,
    pub basis: &'static str,
}

impl AccessAuditEvent {
    pub fn new(identity: &Identity, key: &PermissionKey, resolution: Resolution) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: identity.user_id,
            tenant: identity.tenant_id.as_ref().map(|t| t.to_string()),
            role: identity.role.to_string(),
            element: key.element.to_string(),
            action: key.action.to_string(),
            granted: resolution.granted(),
            basis: resolution.basis(),
        }
    }

    pub fn log(&self) {
        if self.granted {
            info!(
                event = "access_granted",
                user_id = %self.user_id,
                tenant = ?self.tenant,
                role = %self.role,
                element = %self.element,
                action = %self.action,
                basis = self.basis,
                "Access granted"
            );
        } else {
            info!(
                event = "access_denied",
                user_id = %self.user_id,
                tenant = ?self.tenant,
                role = %self.role,
                element = %self.element,
                action = %self.action,
                basis = self.basis,
                "Access denied"
            );
        }
    }
}

/// Log an access decision.
pub fn log_decision(identity: &Identity, key: &PermissionKey, resolution: Resolution) {
    AccessAuditEvent::new(identity, key, resolution).log();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::Fault;

    #[test]
    fn test_event_from_faulted_resolution() {
        let identity = Identity::new(Uuid::new_v4(), "viewer").with_tenant("acme");
        let key = PermissionKey::parse("contract:field.value", "editable").unwrap();

        let event = AccessAuditEvent::new(
            &identity,
            &key,
            Resolution::Faulted { fault: Fault::Timeout },
        );

        assert!(!event.granted);
        assert_eq!(event.basis, "timeout");
        assert_eq!(event.tenant.as_deref(), Some("acme"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["element"], "contract:field.value");
        assert_eq!(json["action"], "editable");
    }
}
