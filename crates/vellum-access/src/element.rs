//! Element paths and actions.
//!
//! An element path names a protected page, resource or form field, e.g.
//! `contact:field.email` or `crm:sales:deal`. Paths are opaque: the only
//! structure ever interpreted is a trailing `*`, which turns a policy record
//! into a prefix match.

use crate::error::AccessError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Validated element path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPath(String);

impl ElementPath {
    /// Parse and validate a path.
    ///
    /// Segments are separated by `:` or `.`, must be non-empty and may contain
    /// ASCII alphanumerics, `_` and `-`. A single `*` is allowed as the final
    /// segment.
    pub fn parse(raw: &str) -> Result<Self, AccessError> {
        let malformed = |reason: &str| AccessError::MalformedElementPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(malformed("empty path"));
        }

        let segments: Vec<&str> = raw.split([':', '.']).collect();
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                return Err(malformed("empty segment"));
            }
            if *segment == "*" {
                if i != last {
                    return Err(malformed("wildcard must be the final segment"));
                }
                continue;
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(malformed("invalid character"));
            }
        }

        Ok(Self(raw.to_string()))
    }

    /// Wrap a path built from known-valid segments.
    pub(crate) fn trusted(raw: String) -> Self {
        debug_assert!(Self::parse(&raw).is_ok(), "untrusted element path {raw}");
        Self(raw)
    }

    /// The path as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this path ends in a `*` segment.
    pub fn is_wildcard(&self) -> bool {
        self.0.ends_with('*')
    }

    /// Whether `self`, used as a policy pattern, covers `path`.
    ///
    /// `contact:*` covers `contact:field.email`; `contact:field.*` covers
    /// `contact:field.email` but not `contact:notes`. Non-wildcard patterns
    /// match exactly.
    pub fn covers(&self, path: &ElementPath) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => path.0.starts_with(prefix) && path.0.len() > prefix.len(),
            None => self.0 == path.0,
        }
    }

    /// This path plus every wildcard pattern that covers it, from `*` down
    /// to the longest prefix: `contact:field.email` yields `*`, `contact:*`,
    /// `contact:field.*` and itself.
    pub fn covering_patterns(&self) -> Vec<ElementPath> {
        let mut patterns = vec![Self::trusted("*".to_string())];
        for (i, c) in self.0.char_indices() {
            if c == ':' || c == '.' {
                patterns.push(Self::trusted(format!("{}*", &self.0[..=i])));
            }
        }
        if !self.is_wildcard() {
            patterns.push(self.clone());
        }
        patterns
    }

    /// Ordering weight used to pick the most specific covering pattern.
    pub fn specificity(&self) -> usize {
        if self.is_wildcard() {
            self.0.len() - 1
        } else {
            usize::MAX
        }
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ElementPath {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ElementPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ElementPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Action performed on an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Visible,
    Editable,
    Read,
    Create,
    Update,
    Delete,
    /// Any other action name known to the permission store.
    Custom(String),
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Visible => "visible",
            Self::Editable => "editable",
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom(name) => name,
        }
    }

    /// The four CRUD actions.
    pub fn crud() -> [Action; 4] {
        [Self::Create, Self::Read, Self::Update, Self::Delete]
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "visible" => Self::Visible,
            "editable" => Self::Editable,
            "read" => Self::Read,
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Custom(name),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let action = Self::from(raw.as_str());
        if action.as_str().is_empty() {
            return Err(serde::de::Error::custom("empty action name"));
        }
        Ok(action)
    }
}

/// An element path paired with an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub element: ElementPath,
    pub action: Action,
}

impl PermissionKey {
    pub fn new(element: ElementPath, action: Action) -> Self {
        Self { element, action }
    }

    /// Parse the element path and pair it with `action`.
    pub fn parse(element: &str, action: impl Into<Action>) -> Result<Self, AccessError> {
        let element = ElementPath::parse(element)?;
        let action = action.into();
        if action.as_str().is_empty() {
            return Err(AccessError::MalformedAction {
                reason: "empty action name".to_string(),
            });
        }
        Ok(Self::new(element, action))
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.element, self.action)
    }
}
