//! Field guard.
//!
//! A pure function of an element's `visible` and `editable` grants. It
//! never starts a fetch; callers feed it snapshots from an
//! [`ElementHandle`](crate::handle::ElementHandle).

use crate::grant::GrantState;
use crate::handle::{ElementHandle, ElementPermissions};
use serde::Serialize;

/// How a field is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccess {
    Loading,
    Hidden,
    ReadOnly,
    Editable,
}

/// Map grants to field access.
///
/// A denied `visible` hides the field whatever `editable` says. A denied
/// `editable` shows the field read-only only when `read_only_on_deny` is
/// set; otherwise it is hidden.
pub fn field_access(permissions: ElementPermissions, read_only_on_deny: bool) -> FieldAccess {
    match (permissions.visible, permissions.editable) {
        (GrantState::Denied, _) => FieldAccess::Hidden,
        (GrantState::Pending, _) | (_, GrantState::Pending) => FieldAccess::Loading,
        (GrantState::Granted, GrantState::Granted) => FieldAccess::Editable,
        (GrantState::Granted, GrantState::Denied) if read_only_on_deny => FieldAccess::ReadOnly,
        (GrantState::Granted, GrantState::Denied) => FieldAccess::Hidden,
    }
}

/// Props handed to the wrapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldProps {
    pub read_only: bool,
    pub disabled: bool,
}

/// Rendered output of a field guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRender<N> {
    /// Grants still loading; the caller's placeholder, if any.
    Placeholder(Option<N>),
    /// Field hidden; the caller's fallback, if any.
    Fallback(Option<N>),
    /// Field rendered with the given props.
    Field { node: N, props: FieldProps },
}

impl<N> FieldRender<N> {
    pub fn node(&self) -> Option<&N> {
        match self {
            Self::Placeholder(node) | Self::Fallback(node) => node.as_ref(),
            Self::Field { node, .. } => Some(node),
        }
    }
}

/// Wrapper around one form field.
#[derive(Debug, Clone)]
pub struct FieldGuard<N> {
    element: String,
    read_only_on_deny: bool,
    fallback: Option<N>,
    placeholder: Option<N>,
}

impl<N: Clone> FieldGuard<N> {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            read_only_on_deny: false,
            fallback: None,
            placeholder: None,
        }
    }

    pub fn read_only_on_deny(mut self, read_only: bool) -> Self {
        self.read_only_on_deny = read_only;
        self
    }

    pub fn with_fallback(mut self, fallback: N) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_placeholder(mut self, placeholder: N) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn access(&self, permissions: ElementPermissions) -> FieldAccess {
        field_access(permissions, self.read_only_on_deny)
    }

    /// Render from a grant snapshot. `children` builds the field and is
    /// only called when the field is shown.
    pub fn render(
        &self,
        permissions: ElementPermissions,
        children: impl FnOnce(FieldProps) -> N,
    ) -> FieldRender<N> {
        match self.access(permissions) {
            FieldAccess::Loading => FieldRender::Placeholder(self.placeholder.clone()),
            FieldAccess::Hidden => FieldRender::Fallback(self.fallback.clone()),
            FieldAccess::ReadOnly => {
                let props = FieldProps {
                    read_only: true,
                    disabled: true,
                };
                FieldRender::Field {
                    node: children(props),
                    props,
                }
            }
            FieldAccess::Editable => {
                let props = FieldProps {
                    read_only: false,
                    disabled: false,
                };
                FieldRender::Field {
                    node: children(props),
                    props,
                }
            }
        }
    }

    /// Render from a live element handle's current snapshot.
    pub fn render_handle(
        &self,
        handle: &ElementHandle,
        children: impl FnOnce(FieldProps) -> N,
    ) -> FieldRender<N> {
        self.render(handle.snapshot(), children)
    }
}
