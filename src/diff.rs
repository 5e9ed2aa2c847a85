//! Drift detection between desired inputs and observed outputs.
//!
//! [`diff`] walks the fields of the desired inputs and compares them with
//! what was last read from the platform. Each field has a [`FieldPolicy`]
//! saying whether a difference can be applied in place, forces the resource
//! to be replaced, or is ignored because the platform owns the value.
//!
//! Fields missing from the desired inputs mean "caller does not care" and
//! never produce a change. An explicit `null` asks for the field to be
//! cleared.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::Schema;

/// How a difference in one field is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Updated in place.
    #[default]
    Mutable,
    /// Immutable; a difference requires delete and recreate.
    Replace,
    /// Assigned by the platform; never compared.
    OutputOnly,
}

/// Per-field policies in a stable declaration order.
///
/// Fields without a declared policy are [`FieldPolicy::Mutable`] and are
/// compared after every declared field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldPolicies {
    entries: Vec<(String, FieldPolicy)>,
}

impl FieldPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare (or redeclare) the policy of `field`.
    ///
    /// Redeclaring keeps the field's original position.
    pub fn with(mut self, field: impl Into<String>, policy: FieldPolicy) -> Self {
        self.set(field, policy);
        self
    }

    /// Declare a mutable field.
    pub fn mutable(self, field: impl Into<String>) -> Self {
        self.with(field, FieldPolicy::Mutable)
    }

    /// Declare an immutable field.
    pub fn replace(self, field: impl Into<String>) -> Self {
        self.with(field, FieldPolicy::Replace)
    }

    /// Declare a platform-owned field.
    pub fn output_only(self, field: impl Into<String>) -> Self {
        self.with(field, FieldPolicy::OutputOnly)
    }

    /// Declare (or redeclare) the policy of `field` in place.
    pub fn set(&mut self, field: impl Into<String>, policy: FieldPolicy) {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = policy,
            None => self.entries.push((field, policy)),
        }
    }

    /// Derive policies from a schema, in attribute name order.
    ///
    /// Output-only attributes become [`FieldPolicy::OutputOnly`], attributes
    /// marked `replace_on_change` become [`FieldPolicy::Replace`], and every
    /// other attribute is [`FieldPolicy::Mutable`].
    pub fn from_schema(schema: &Schema) -> Self {
        let entries = schema
            .attributes
            .iter()
            .map(|(name, attr)| {
                let policy = if attr.flags.is_output_only() {
                    FieldPolicy::OutputOnly
                } else if attr.replace_on_change {
                    FieldPolicy::Replace
                } else {
                    FieldPolicy::Mutable
                };
                (name.clone(), policy)
            })
            .collect();
        Self { entries }
    }

    /// The policy of `field`.
    pub fn get(&self, field: &str) -> FieldPolicy {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, policy)| *policy)
            .unwrap_or_default()
    }

    /// Whether `field` has a declared policy.
    pub fn is_declared(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    /// Declared fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldPolicy)> {
        self.entries.iter().map(|(name, policy)| (name.as_str(), *policy))
    }
}

/// What happens to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// The field is not set remotely and will be.
    Add,
    /// The field will be changed in place.
    Modify,
    /// The field will be cleared.
    Remove,
    /// The field is immutable and differs.
    Replace,
}

impl ChangeKind {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Modify => "~",
            Self::Remove => "-",
            Self::Replace => "+-",
        }
    }
}

/// A difference in one top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name.
    pub path: String,
    pub kind: ChangeKind,
    /// Observed value, `None` if the field was not set.
    pub before: Option<Value>,
    /// Desired value, `None` if the field is being cleared.
    pub after: Option<Value>,
}

impl FieldChange {
    fn new(path: &str, kind: ChangeKind, before: Option<&Value>, after: Option<&Value>) -> Self {
        Self {
            path: path.to_string(),
            kind,
            before: before.cloned(),
            after: after.cloned(),
        }
    }
}

/// Ordered field-level differences. Empty means nothing to do.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replace_reason: Option<String>,
}

impl ChangeSet {
    /// A change set holding `changes`; the first `Replace` entry, if any, becomes the reason.
    pub fn from_changes(changes: Vec<FieldChange>) -> Self {
        let replace_reason = changes
            .iter()
            .find(|c| c.kind == ChangeKind::Replace)
            .map(|c| replace_reason(&c.path));
        Self {
            changes,
            replace_reason,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// The differences, in comparison order.
    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    /// Whether applying this change set needs delete and recreate.
    pub fn requires_replace(&self) -> bool {
        self.replace_reason.is_some()
    }

    /// Which immutable field forced replacement.
    pub fn replace_reason(&self) -> Option<&str> {
        self.replace_reason.as_deref()
    }

    /// Names of the changed fields.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|c| c.path.as_str())
    }

    /// The request body of an in-place update: every changed field with its
    /// desired value, cleared fields as `null`.
    pub fn patch(&self) -> Map<String, Value> {
        self.changes
            .iter()
            .map(|c| (c.path.clone(), c.after.clone().unwrap_or(Value::Null)))
            .collect()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changes.is_empty() {
            return f.write_str("no changes");
        }
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}{}", change.kind.symbol(), change.path)?;
        }
        Ok(())
    }
}

fn replace_reason(field: &str) -> String {
    format!("field '{}' cannot be changed in place", field)
}

/// Compare `desired` inputs with `observed` outputs.
///
/// Declared fields are compared first, in declaration order, then any other
/// desired field in key order. Comparison stops at the first immutable field
/// that differs; that field is the reported replacement reason.
pub fn diff(desired: &Value, observed: &Value, policies: &FieldPolicies) -> ChangeSet {
    let Some(desired) = desired.as_object() else {
        return ChangeSet::default();
    };
    let observed = observed.as_object();

    let declared = policies.iter().map(|(name, _)| name);
    let undeclared = desired
        .keys()
        .map(String::as_str)
        .filter(|name| !policies.is_declared(name));

    let mut changes = Vec::new();
    for field in declared.chain(undeclared) {
        let policy = policies.get(field);
        if policy == FieldPolicy::OutputOnly {
            continue;
        }
        let Some(want) = desired.get(field) else {
            continue;
        };
        let have = observed.and_then(|o| o.get(field)).filter(|v| !v.is_null());

        let kind = match (want, have) {
            (Value::Null, None) => continue,
            (Value::Null, Some(_)) => ChangeKind::Remove,
            (_, None) => ChangeKind::Add,
            (want, Some(have)) if values_equal(want, have) => continue,
            _ => ChangeKind::Modify,
        };

        let after = (!want.is_null()).then_some(want);
        if policy == FieldPolicy::Replace {
            changes.push(FieldChange::new(field, ChangeKind::Replace, have, after));
            return ChangeSet {
                changes,
                replace_reason: Some(replace_reason(field)),
            };
        }
        changes.push(FieldChange::new(field, kind, have, after));
    }

    ChangeSet {
        changes,
        replace_reason: None,
    }
}

/// Deep equality where numbers compare by value, so `301` equals `301.0`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        },
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        },
        _ => a == b,
    }
}
