//! Permission source backed by a Supabase/PostgREST backend.

use crate::element::{Action, ElementPath, PermissionKey};
use crate::error::{SourceError, SourceResult};
use crate::identity::AccessScope;
use crate::source::PermissionSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use vellum_common_config::SourceConfig;
use vellum_common_http::{HttpClient, HttpConfig, RequestBuilder};

/// Arguments of the single-check RPC.
#[derive(Debug, Serialize)]
struct CheckArgs<'a> {
    p_tenant_id: Option<&'a str>,
    p_role: &'a str,
    p_element_path: &'a str,
    p_action: &'a str,
}

/// Row of the permissions table.
#[derive(Debug, Deserialize)]
struct PermissionRow {
    element_path: String,
    action: String,
    granted: bool,
    #[serde(default)]
    tenant_id: Option<String>,
}

/// REST permission source.
#[derive(Debug, Clone)]
pub struct RestPermissionSource {
    client: HttpClient,
    check_function: String,
    permissions_table: String,
}

impl RestPermissionSource {
    pub fn new(
        client: HttpClient,
        check_function: impl Into<String>,
        permissions_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            check_function: check_function.into(),
            permissions_table: permissions_table.into(),
        }
    }

    /// Build from configuration. The HTTP request timeout matches the
    /// evaluator's fetch timeout.
    pub fn from_config(config: &SourceConfig, timeout: Duration) -> SourceResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| SourceError::Backend {
            message: "source.url is required for the rest source".to_string(),
        })?;

        let mut request = RequestBuilder::new().base_url(url).json_content();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.gateway_key(key);
        }

        let http = HttpConfig {
            request_timeout: timeout,
            ..HttpConfig::default()
        };
        let client = HttpClient::with_config(&http, request)?;

        Ok(Self::new(client, &config.check_function, &config.permissions_table))
    }

    fn tenant_filter(scope: &AccessScope) -> (&'static str, String) {
        match &scope.tenant {
            Some(tenant) => (
                "or",
                format!("(tenant_id.eq.{},tenant_id.is.null)", quote(tenant.as_str())),
            ),
            None => ("tenant_id", "is.null".to_string()),
        }
    }
}

/// Double-quote a PostgREST filter value so `,`, `.` and `)` stay literal.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// PostgREST `in.(...)` list, each value double quoted.
fn in_list<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let quoted: Vec<String> = values.map(quote).collect();
    format!("in.({})", quoted.join(","))
}

/// A permissions-table row that parsed cleanly.
struct Record {
    pattern: ElementPath,
    action: Action,
    granted: bool,
    tenant_row: bool,
}

#[async_trait]
impl PermissionSource for RestPermissionSource {
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        let args = CheckArgs {
            p_tenant_id: scope.tenant.as_ref().map(|t| t.as_str()),
            p_role: scope.role.as_str(),
            p_element_path: key.element.as_str(),
            p_action: key.action.as_str(),
        };
        let path = format!("/rest/v1/rpc/{}", self.check_function);
        let granted: Option<bool> = self.client.post_json(&path, &args).await?;
        debug!(scope = %scope, key = %key, granted = ?granted, "permission rpc answered");
        Ok(granted)
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        // Wildcard records are stored under their pattern, so ask for every
        // pattern that could cover a requested path.
        let mut patterns: Vec<ElementPath> = keys
            .iter()
            .flat_map(|k| k.element.covering_patterns())
            .collect();
        patterns.sort_unstable();
        patterns.dedup();

        let (tenant_param, tenant_value) = Self::tenant_filter(scope);
        let query = [
            ("select", "element_path,action,granted,tenant_id".to_string()),
            ("role", format!("eq.{}", scope.role)),
            ("element_path", in_list(patterns.iter().map(ElementPath::as_str))),
            (tenant_param, tenant_value),
        ];
        let path = format!("/rest/v1/{}", self.permissions_table);
        let rows: Vec<PermissionRow> = self.client.get_json(&path, &query).await?;

        let records: Vec<Record> = rows
            .into_iter()
            .filter_map(|row| match ElementPath::parse(&row.element_path) {
                Ok(pattern) => Some(Record {
                    pattern,
                    action: Action::from(row.action.as_str()),
                    granted: row.granted,
                    tenant_row: row.tenant_id.is_some(),
                }),
                Err(err) => {
                    warn!(error = %err, "skipping malformed permission row");
                    None
                }
            })
            .collect();

        // Most specific pattern wins; a tenant row beats a global one of
        // equal specificity.
        let mut found: HashMap<PermissionKey, bool> = HashMap::new();
        for key in keys {
            let best = records
                .iter()
                .filter(|r| r.action == key.action && r.pattern.covers(&key.element))
                .max_by_key(|r| (r.pattern.specificity(), r.tenant_row));
            if let Some(record) = best {
                found.insert(key.clone(), record.granted);
            }
        }

        debug!(scope = %scope, requested = keys.len(), found = found.len(), "bulk permissions fetched");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Role, TenantId};

    #[test]
    fn test_in_list_quotes_values() {
        let list = in_list(["contact:field.email", "deal:*"].into_iter());
        assert_eq!(list, r#"in.("contact:field.email","deal:*")"#);
    }

    #[test]
    fn test_quote_escapes_filter_syntax() {
        assert_eq!(quote("acme"), r#""acme""#);
        assert_eq!(quote(r#"a,b)"c\d"#), r#""a,b)\"c\\d""#);
    }

    #[test]
    fn test_tenant_filter_quotes_tenant() {
        let scope = AccessScope {
            tenant: Some(TenantId::new("acme,tenant_id.is.null)")),
            role: Role::new("sales"),
        };
        let (param, value) = RestPermissionSource::tenant_filter(&scope);
        assert_eq!(param, "or");
        assert_eq!(value, r#"(tenant_id.eq."acme,tenant_id.is.null)",tenant_id.is.null)"#);

        let global = AccessScope {
            tenant: None,
            role: Role::new("sales"),
        };
        assert_eq!(
            RestPermissionSource::tenant_filter(&global),
            ("tenant_id", "is.null".to_string())
        );
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = SourceConfig::default();
        assert!(matches!(
            RestPermissionSource::from_config(&config, Duration::from_secs(1)),
            Err(SourceError::Backend { .. })
        ));
    }
}
