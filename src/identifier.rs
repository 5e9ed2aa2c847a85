//! Composite resource identifiers.
//!
//! A [`ResourceId`] is what the orchestrating engine persists for every
//! managed resource, so its string form is a stable contract. The shape of
//! the string is fixed per resource kind by an [`IdFormat`]:
//!
//! | Format       | Encoded form                    | Example               |
//! |--------------|---------------------------------|-----------------------|
//! | `Root`       | `{localId}`                     | `5f0c8c9e1c9d44`      |
//! | `Singleton`  | `{scope}/{kind}`                | `5f0c8c9e/robots.txt` |
//! | `Collection` | `{scope}/{kind}/{localId}`      | `5f0c8c9e/redirects/r1` |
//!
//! Scopes never contain `/`; a collection's local id may. No part may be
//! a `.` or `..` path segment.
//!
//! ```
//! use webflow_provider_sdk::identifier::{IdFormat, ResourceId};
//!
//! let format = IdFormat::collection("redirects");
//! let id = ResourceId::collection("site1", "redirects", "r1").unwrap();
//! assert_eq!(id.encode(), "site1/redirects/r1");
//! assert_eq!(format.decode("site1/redirects/r1").unwrap(), id);
//! assert!(format.decode("site1/assets/r1").is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while building or decoding an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The identifier string was empty.
    #[error("resource ID cannot be empty (expected {expected})")]
    Empty {
        /// The expected shape.
        expected: String,
    },

    /// The identifier string does not have the expected shape.
    #[error("invalid resource ID format: expected {expected}, got: {id}")]
    Malformed {
        /// The offending identifier.
        id: String,
        /// The expected shape.
        expected: String,
    },

    /// One of the parts used to build an identifier is invalid.
    #[error("invalid resource ID {part}: {reason}")]
    InvalidPart {
        /// Which part (scope, kind, local id).
        part: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// The shape of the identifiers of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum IdFormat {
    /// `{localId}`: a top-level object.
    Root,
    /// `{scope}/{kind}`: at most one per parent.
    Singleton {
        /// The kind segment.
        kind: String,
    },
    /// `{scope}/{kind}/{localId}`: many per parent.
    Collection {
        /// The kind segment.
        kind: String,
    },
}

impl IdFormat {
    /// A singleton format with the given kind segment.
    pub fn singleton(kind: impl Into<String>) -> Self {
        Self::Singleton { kind: kind.into() }
    }

    /// A collection format with the given kind segment.
    pub fn collection(kind: impl Into<String>) -> Self {
        Self::Collection { kind: kind.into() }
    }

    /// The kind segment, if the format has one.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Singleton { kind } | Self::Collection { kind } => Some(kind),
        }
    }

    /// Human-readable template of the encoded form.
    pub fn template(&self) -> String {
        match self {
            Self::Root => "{localId}".to_string(),
            Self::Singleton { kind } => format!("{{scope}}/{kind}"),
            Self::Collection { kind } => format!("{{scope}}/{kind}/{{localId}}"),
        }
    }

    /// Build an identifier of this format from its parts.
    ///
    /// Parts the format does not use must be `None`.
    pub fn build(&self, scope: Option<&str>, local_id: Option<&str>) -> Result<ResourceId, IdError> {
        match (self, scope, local_id) {
            (Self::Root, None, Some(local)) => ResourceId::root(local),
            (Self::Singleton { kind }, Some(scope), None) => ResourceId::singleton(scope, kind.as_str()),
            (Self::Collection { kind }, Some(scope), Some(local)) => {
                ResourceId::collection(scope, kind.as_str(), local)
            },
            (_, None, _) if !matches!(self, Self::Root) => Err(IdError::InvalidPart {
                part: "scope",
                reason: format!("a scope is required for {}", self.template()),
            }),
            (Self::Singleton { .. }, _, Some(_)) | (Self::Root, Some(_), _) => {
                Err(IdError::InvalidPart {
                    part: "local id",
                    reason: format!("unexpected part for {}", self.template()),
                })
            },
            _ => Err(IdError::InvalidPart {
                part: "local id",
                reason: format!("a local id is required for {}", self.template()),
            }),
        }
    }

    /// Decode an identifier string of this format.
    pub fn decode(&self, id: &str) -> Result<ResourceId, IdError> {
        if id.is_empty() {
            return Err(IdError::Empty {
                expected: self.template(),
            });
        }
        let malformed = || IdError::Malformed {
            id: id.to_string(),
            expected: self.template(),
        };

        match self {
            Self::Root => ResourceId::root(id).map_err(|_| malformed()),
            Self::Singleton { kind } => {
                let (scope, rest) = id.split_once('/').ok_or_else(malformed)?;
                if rest != kind {
                    return Err(malformed());
                }
                ResourceId::singleton(scope, kind.as_str()).map_err(|_| malformed())
            },
            Self::Collection { kind } => {
                let (scope, rest) = id.split_once('/').ok_or_else(malformed)?;
                let local = rest
                    .strip_prefix(kind.as_str())
                    .and_then(|r| r.strip_prefix('/'))
                    .ok_or_else(malformed)?;
                ResourceId::collection(scope, kind.as_str(), local).map_err(|_| malformed())
            },
        }
    }
}

/// A decoded composite resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    format: IdFormat,
    scope: Option<String>,
    local_id: Option<String>,
}

impl ResourceId {
    /// A top-level identifier.
    pub fn root(local_id: impl Into<String>) -> Result<Self, IdError> {
        let local_id = local_id.into();
        check_segment("local id", &local_id)?;
        Ok(Self {
            format: IdFormat::Root,
            scope: None,
            local_id: Some(local_id),
        })
    }

    /// A singleton identifier under `scope`.
    pub fn singleton(scope: impl Into<String>, kind: impl Into<String>) -> Result<Self, IdError> {
        let (scope, kind) = (scope.into(), kind.into());
        check_segment("scope", &scope)?;
        check_kind(&kind)?;
        Ok(Self {
            format: IdFormat::Singleton { kind },
            scope: Some(scope),
            local_id: None,
        })
    }

    /// A collection member identifier under `scope`.
    pub fn collection(
        scope: impl Into<String>,
        kind: impl Into<String>,
        local_id: impl Into<String>,
    ) -> Result<Self, IdError> {
        let (scope, kind, local_id) = (scope.into(), kind.into(), local_id.into());
        check_segment("scope", &scope)?;
        check_kind(&kind)?;
        if local_id.is_empty() {
            return Err(IdError::InvalidPart {
                part: "local id",
                reason: "cannot be empty".to_string(),
            });
        }
        if local_id.split('/').any(is_dot_segment) {
            return Err(IdError::InvalidPart {
                part: "local id",
                reason: format!("'{}' must not contain '.' or '..' segments", local_id),
            });
        }
        Ok(Self {
            format: IdFormat::Collection { kind },
            scope: Some(scope),
            local_id: Some(local_id),
        })
    }

    /// Decode `id` with the given format.
    pub fn decode(id: &str, format: &IdFormat) -> Result<Self, IdError> {
        format.decode(id)
    }

    /// The format this identifier was built with.
    pub fn format(&self) -> &IdFormat {
        &self.format
    }

    /// The parent scope (e.g. the site), if the format has one.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The kind segment, if the format has one.
    pub fn kind(&self) -> Option<&str> {
        self.format.kind()
    }

    /// The platform-assigned id, if the format has one.
    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    /// The stable string form.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            f.write_str(scope)?;
        }
        if let Some(kind) = self.format.kind() {
            write!(f, "/{}", kind)?;
        }
        if let Some(local) = &self.local_id {
            if self.scope.is_some() {
                f.write_str("/")?;
            }
            f.write_str(local)?;
        }
        Ok(())
    }
}

/// Check a parent scope value, e.g. a site id taken from inputs.
pub fn check_scope(scope: &str) -> Result<(), IdError> {
    check_segment("scope", scope)
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

fn check_segment(part: &'static str, value: &str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::InvalidPart {
            part,
            reason: "cannot be empty".to_string(),
        });
    }
    if value.contains('/') {
        return Err(IdError::InvalidPart {
            part,
            reason: format!("'{}' must not contain '/'", value),
        });
    }
    if is_dot_segment(value) {
        return Err(IdError::InvalidPart {
            part,
            reason: format!("'{}' is not a valid path segment", value),
        });
    }
    Ok(())
}

fn check_kind(kind: &str) -> Result<(), IdError> {
    if kind.is_empty() || kind.split('/').any(|s| s.is_empty() || is_dot_segment(s)) {
        return Err(IdError::InvalidPart {
            part: "kind",
            reason: format!("'{}' must be non-empty with no empty segments", kind),
        });
    }
    Ok(())
}
