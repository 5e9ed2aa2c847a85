//! Values exchanged between the lifecycle controller and its caller.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::ChangeSet;
use crate::error::ProviderError;

/// A lifecycle operation, as named in errors and log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Check,
    Diff,
    Create,
    Read,
    Update,
    Delete,
    Import,
    Apply,
    Invoke,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Diff => "diff",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
            Self::Apply => "apply",
            Self::Invoke => "invoke",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The externally persisted record of one managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Encoded resource identifier.
    #[serde(rename = "resourceId")]
    pub id: String,
    /// Inputs as the caller provided them.
    #[serde(rename = "desiredInputs")]
    pub inputs: Value,
    /// Outputs as last read from the platform.
    #[serde(rename = "observedOutputs")]
    pub outputs: Value,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, inputs: Value, outputs: Value) -> Self {
        Self {
            id: id.into(),
            inputs,
            outputs,
        }
    }

    /// One output field.
    pub fn output(&self, field: &str) -> Option<&Value> {
        self.outputs.get(field)
    }
}

/// The result of a read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The resource exists; these are its outputs.
    Present(Value),
    /// The resource no longer exists remotely.
    Absent,
}

impl ReadOutcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The observed outputs, if present.
    pub fn outputs(&self) -> Option<&Value> {
        match self {
            Self::Present(outputs) => Some(outputs),
            Self::Absent => None,
        }
    }

    pub fn into_outputs(self) -> Option<Value> {
        match self {
            Self::Present(outputs) => Some(outputs),
            Self::Absent => None,
        }
    }
}

/// What `diff` decided must happen to a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Desired and observed state agree.
    NoChange,
    /// The resource does not exist (or vanished) and must be created.
    PendingCreate,
    /// Apply these changes in place.
    PendingUpdate(ChangeSet),
    /// An immutable field differs; delete, then create.
    PendingReplace(ChangeSet),
    /// The resource is no longer desired.
    PendingDelete,
}

impl Plan {
    /// The lifecycle phase this plan puts the resource in.
    pub fn phase(&self) -> Phase {
        match self {
            Self::NoChange => Phase::NoChange,
            Self::PendingCreate => Phase::PendingCreate,
            Self::PendingUpdate(_) => Phase::PendingUpdate,
            Self::PendingReplace(_) => Phase::PendingReplace,
            Self::PendingDelete => Phase::PendingDelete,
        }
    }

    /// The field changes behind an update or replacement.
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            Self::PendingUpdate(changes) | Self::PendingReplace(changes) => Some(changes),
            _ => None,
        }
    }

    /// Whether applying the plan calls the platform at all.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::NoChange)
    }
}

/// Lifecycle phases of one managed resource.
///
/// `Unmanaged -> Checked -> {NoChange | Pending*} -> Applying -> {Committed | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unmanaged,
    Checked,
    NoChange,
    PendingCreate,
    PendingUpdate,
    PendingReplace,
    PendingDelete,
    Applying,
    Committed,
    Failed,
}

impl Phase {
    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (Unmanaged, Checked) => true,
            (Checked, NoChange | PendingCreate | PendingUpdate | PendingReplace | PendingDelete) => {
                true
            },
            (PendingCreate | PendingUpdate | PendingReplace | PendingDelete, Applying) => true,
            (Applying, Committed | Failed) => true,
            (Checked | NoChange | PendingCreate | PendingUpdate | PendingReplace | PendingDelete, Failed) => true,
            _ => false,
        }
    }

    /// Whether the phase is terminal for one reconciliation pass.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::NoChange | Phase::Committed | Phase::Failed)
    }
}

/// Options for [`LifecycleController::apply`](crate::lifecycle::LifecycleController::apply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyOptions {
    /// Stop after planning; make no mutating call.
    pub dry_run: bool,
}

impl ApplyOptions {
    pub fn preview() -> Self {
        Self { dry_run: true }
    }
}

/// The result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// What diff decided.
    pub plan: Plan,
    /// The final phase: `NoChange`, a pending phase for dry runs, or `Committed`.
    pub phase: Phase,
    /// The state to persist; `None` once the resource is deleted.
    pub state: Option<ResourceState>,
}

/// Convert a dynamic input bag into an adapter's typed inputs.
pub fn decode_inputs<T: DeserializeOwned>(inputs: &Value) -> Result<T, ProviderError> {
    T::deserialize(inputs).map_err(|e| ProviderError::Validation(e.to_string()))
}

/// Convert typed values back into a dynamic property bag.
pub fn encode_outputs<T: Serialize>(outputs: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(outputs)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff, FieldPolicies};
    use serde_json::json;

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Import.as_str(), "import");
        assert_eq!(serde_json::to_value(Operation::Delete).unwrap(), json!("delete"));
    }

    #[test]
    fn test_state_serialization_shape() {
        let state = ResourceState::new("site1/redirects/r1", json!({"a": 1}), json!({"a": 1, "b": 2}));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({
                "resourceId": "site1/redirects/r1",
                "desiredInputs": {"a": 1},
                "observedOutputs": {"a": 1, "b": 2}
            })
        );
        let back: ResourceState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.output("b"), Some(&json!(2)));
    }

    #[test]
    fn test_read_outcome() {
        assert!(ReadOutcome::Absent.is_absent());
        let present = ReadOutcome::Present(json!({"id": "x"}));
        assert_eq!(present.outputs(), Some(&json!({"id": "x"})));
        assert_eq!(present.into_outputs(), Some(json!({"id": "x"})));
    }

    #[test]
    fn test_plan_phase() {
        let changes = diff(&json!({"a": 1}), &json!({"a": 2}), &FieldPolicies::new());
        assert_eq!(Plan::NoChange.phase(), Phase::NoChange);
        assert_eq!(Plan::PendingUpdate(changes.clone()).phase(), Phase::PendingUpdate);
        assert_eq!(Plan::PendingUpdate(changes.clone()).changes(), Some(&changes));
        assert!(Plan::PendingCreate.changes().is_none());
        assert!(Plan::NoChange.is_no_op());
    }

    #[test]
    fn test_phase_transitions() {
        assert!(Phase::Unmanaged.can_transition_to(Phase::Checked));
        assert!(Phase::Checked.can_transition_to(Phase::PendingReplace));
        assert!(Phase::PendingCreate.can_transition_to(Phase::Applying));
        assert!(Phase::Applying.can_transition_to(Phase::Committed));
        assert!(Phase::Applying.can_transition_to(Phase::Failed));
        assert!(!Phase::Unmanaged.can_transition_to(Phase::Applying));
        assert!(!Phase::NoChange.can_transition_to(Phase::Applying));
        assert!(!Phase::Committed.can_transition_to(Phase::Checked));
        assert!(Phase::Committed.is_terminal());
        assert!(!Phase::Applying.is_terminal());
    }

    #[test]
    fn test_decode_inputs() {
        #[derive(Debug, Deserialize, Serialize, PartialEq)]
        #[serde(rename_all = "camelCase")]
        struct RobotsInputs {
            site_id: String,
            content: Option<String>,
        }

        let typed: RobotsInputs =
            decode_inputs(&json!({"siteId": "s1", "content": "User-agent: *"})).unwrap();
        assert_eq!(typed.site_id, "s1");
        assert_eq!(
            encode_outputs(&typed).unwrap(),
            json!({"siteId": "s1", "content": "User-agent: *"})
        );

        let err = decode_inputs::<RobotsInputs>(&json!({"content": "x"})).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(msg) if msg.contains("siteId")));
    }
}
