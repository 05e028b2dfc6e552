//! Permission source abstraction.

use crate::element::PermissionKey;
use crate::error::SourceResult;
use crate::identity::AccessScope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Backend holding permission records.
///
/// `Ok(None)` means the source has no record for the scope's role; the
/// evaluator then applies the override-role fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionSource: Send + Sync {
    /// Resolve a single key for a tenant and role.
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>>;

    /// Resolve several keys in one round trip. Keys absent from the result
    /// have no record.
    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(granted) = self.fetch_permission(scope, key).await? {
                found.insert(key.clone(), granted);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl<S: PermissionSource + ?Sized> PermissionSource for Arc<S> {
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        (**self).fetch_permission(scope, key).await
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        (**self).fetch_bulk(scope, keys).await
    }
}
