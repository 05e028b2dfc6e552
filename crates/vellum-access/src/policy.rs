//! In-memory permission policy.

use crate::element::{Action, ElementPath, PermissionKey};
use crate::error::SourceResult;
use crate::identity::{AccessScope, Role, TenantId};
use crate::source::PermissionSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// CRM resources covered by the built-in policy.
pub const CRM_RESOURCES: [&str; 6] = [
    "customer",
    "deal",
    "ticket",
    "contract",
    "product_sale",
    "audit_log",
];

/// One permission definition: which roles may perform `action` on
/// `element_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub element_path: ElementPath,
    pub action: Action,
    /// Restrict the record to one tenant. `None` applies to every tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub granted_roles: BTreeSet<Role>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub denied_roles: BTreeSet<Role>,
}

impl PermissionRecord {
    pub fn new(element_path: ElementPath, action: Action) -> Self {
        Self {
            element_path,
            action,
            tenant_id: None,
            granted_roles: BTreeSet::new(),
            denied_roles: BTreeSet::new(),
        }
    }

    pub fn for_tenant(mut self, tenant: TenantId) -> Self {
        self.tenant_id = Some(tenant);
        self
    }

    pub fn grant(mut self, role: impl Into<Role>) -> Self {
        self.granted_roles.insert(role.into());
        self
    }

    pub fn deny(mut self, role: impl Into<Role>) -> Self {
        self.denied_roles.insert(role.into());
        self
    }

    fn applies_to(&self, scope: &AccessScope, key: &PermissionKey) -> bool {
        self.action == key.action
            && self.element_path.covers(&key.element)
            && match &self.tenant_id {
                None => true,
                Some(tenant) => scope.tenant.as_ref() == Some(tenant),
            }
    }

    /// The record's answer for `role`, if it mentions the role at all.
    fn decision(&self, role: &Role) -> Option<bool> {
        if self.denied_roles.contains(role) {
            Some(false)
        } else if self.granted_roles.contains(role) {
            Some(true)
        } else {
            None
        }
    }
}

/// Serialized policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub records: Vec<PermissionRecord>,
}

/// Grants for one role, built up resource by resource.
#[derive(Debug, Clone)]
pub struct RoleGrants {
    role: Role,
    grants: BTreeSet<(ElementPath, Action)>,
}

impl RoleGrants {
    pub fn new(role: impl Into<Role>) -> Self {
        Self {
            role: role.into(),
            grants: BTreeSet::new(),
        }
    }

    pub fn with_permission(mut self, element: ElementPath, action: Action) -> Self {
        self.grants.insert((element, action));
        self
    }

    /// CRUD on `crm:<resource>` and every field of the resource visible and editable.
    pub fn with_full_access(mut self, resource: &str) -> Self {
        for action in Action::crud() {
            self = self.with_permission(resource_path(resource), action);
        }
        self.with_permission(field_pattern(resource), Action::Visible)
            .with_permission(field_pattern(resource), Action::Editable)
    }

    /// Read on `crm:<resource>` and every field visible.
    pub fn with_read_access(self, resource: &str) -> Self {
        self.with_permission(resource_path(resource), Action::Read)
            .with_permission(field_pattern(resource), Action::Visible)
    }
}

fn resource_path(resource: &str) -> ElementPath {
    ElementPath::trusted(format!("crm:{resource}"))
}

fn field_pattern(resource: &str) -> ElementPath {
    ElementPath::trusted(format!("{resource}:field.*"))
}

/// Permission source backed by an in-memory list of records.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionSource {
    records: Vec<PermissionRecord>,
}

impl StaticPermissionSource {
    pub fn new(records: Vec<PermissionRecord>) -> Self {
        Self { records }
    }

    /// Merge per-role grants into records, one record per (element, action).
    pub fn from_roles(roles: impl IntoIterator<Item = RoleGrants>) -> Self {
        let mut merged: BTreeMap<(ElementPath, Action), BTreeSet<Role>> = BTreeMap::new();
        for role in roles {
            for grant in role.grants {
                merged.entry(grant).or_default().insert(role.role.clone());
            }
        }

        let records = merged
            .into_iter()
            .map(|((element_path, action), granted_roles)| PermissionRecord {
                granted_roles,
                ..PermissionRecord::new(element_path, action)
            })
            .collect();

        Self { records }
    }

    /// Parse a YAML policy document.
    pub fn from_yaml(yaml: &str) -> SourceResult<Self> {
        let document: PolicyDocument = serde_yaml::from_str(yaml)?;
        Ok(Self::new(document.records))
    }

    /// Load a YAML policy document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> SourceResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// The CRM's built-in role set.
    ///
    /// `super_admin` has no records at all: it is granted through the
    /// override-role fallback.
    pub fn crm_defaults() -> Self {
        let [customer, deal, ticket, contract, product_sale, audit_log] = CRM_RESOURCES;

        let admin = CRM_RESOURCES
            .iter()
            .fold(RoleGrants::new("admin"), |role, resource| role.with_full_access(resource));

        let manager = [customer, deal, ticket, contract, product_sale]
            .iter()
            .fold(RoleGrants::new("manager"), |role, resource| role.with_full_access(resource))
            .with_read_access(audit_log);

        let sales = RoleGrants::new("sales")
            .with_full_access(customer)
            .with_full_access(deal)
            .with_full_access(product_sale)
            .with_read_access(contract)
            .with_read_access(ticket);

        let support = RoleGrants::new("support")
            .with_full_access(ticket)
            .with_read_access(customer);

        let viewer = [customer, deal, ticket, contract]
            .iter()
            .fold(RoleGrants::new("viewer"), |role, resource| role.with_read_access(resource));

        Self::from_roles([admin, manager, sales, support, viewer])
    }

    pub fn records(&self) -> &[PermissionRecord] {
        &self.records
    }

    /// Serialize the policy back to YAML.
    pub fn to_yaml(&self) -> SourceResult<String> {
        let document = PolicyDocument {
            records: self.records.clone(),
        };
        Ok(serde_yaml::to_string(&document)?)
    }

    /// Answer from the most specific record that mentions the scope's role.
    ///
    /// Exact paths beat wildcards, longer wildcards beat shorter ones, and a
    /// tenant-scoped record beats a global one of equal specificity.
    pub fn lookup(&self, scope: &AccessScope, key: &PermissionKey) -> Option<bool> {
        self.records
            .iter()
            .filter(|record| record.applies_to(scope, key))
            .filter_map(|record| {
                record.decision(&scope.role).map(|granted| {
                    let rank = (record.element_path.specificity(), record.tenant_id.is_some());
                    (rank, granted)
                })
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, granted)| granted)
    }
}

#[async_trait]
impl PermissionSource for StaticPermissionSource {
    async fn fetch_permission(
        &self,
        scope: &AccessScope,
        key: &PermissionKey,
    ) -> SourceResult<Option<bool>> {
        Ok(self.lookup(scope, key))
    }

    async fn fetch_bulk(
        &self,
        scope: &AccessScope,
        keys: &[PermissionKey],
    ) -> SourceResult<HashMap<PermissionKey, bool>> {
        Ok(keys
            .iter()
            .filter_map(|key| self.lookup(scope, key).map(|granted| (key.clone(), granted)))
            .collect())
    }
}
