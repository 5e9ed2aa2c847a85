//! Testing utilities for resource adapters.
//!
//! [`ResourceTester`] drives a [`LifecycleController`] through whole
//! lifecycles so adapter tests read as scenarios rather than call sequences.
//! Point the controller's transport at a mock server.
//!
//! # Example
//!
//! ```ignore
//! use webflow_provider_sdk::testing::ResourceTester;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_redirect_crud() {
//!     let tester = ResourceTester::new(LifecycleController::new(redirects(), transport));
//!
//!     let state = tester
//!         .lifecycle_crud(
//!             json!({"siteId": "s1", "fromUrl": "/a", "toUrl": "/b", "statusCode": 301}),
//!             json!({"siteId": "s1", "fromUrl": "/a", "toUrl": "/c", "statusCode": 301}),
//!         )
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(state.outputs["toUrl"], "/c");
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::cancel::CancelSignal;
use crate::error::OperationError;
use crate::lifecycle::{LifecycleController, ResourceAdapter};
use crate::schema::Diagnostic;
use crate::types::{Phase, Plan, ReadOutcome, ResourceState};

/// A test harness around one lifecycle controller.
pub struct ResourceTester<A> {
    controller: LifecycleController<A>,
    cancel: CancelSignal,
}

impl<A: ResourceAdapter> ResourceTester<A> {
    pub fn new(controller: LifecycleController<A>) -> Self {
        Self {
            controller,
            cancel: CancelSignal::never(),
        }
    }

    /// Run every operation under `cancel`.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn controller(&self) -> &LifecycleController<A> {
        &self.controller
    }

    // =========================================================================
    // Single operations
    // =========================================================================

    /// Validate inputs, failing with the collected diagnostics.
    pub fn check(&self, inputs: &Value) -> Result<Value, TestError> {
        check_diagnostics(self.controller.diagnostics(inputs))?;
        Ok(inputs.clone())
    }

    pub async fn plan_create(&self, inputs: &Value) -> Result<Plan, TestError> {
        self.check(inputs)?;
        Ok(self.controller.diff(None, inputs, &self.cancel).await?)
    }

    pub async fn plan_update(&self, prior: &ResourceState, desired: &Value) -> Result<Plan, TestError> {
        self.check(desired)?;
        Ok(self.controller.diff(Some(&prior.id), desired, &self.cancel).await?)
    }

    pub async fn plan_delete(&self, state: &ResourceState) -> Result<Plan, TestError> {
        Ok(self.controller.diff(Some(&state.id), &Value::Null, &self.cancel).await?)
    }

    pub async fn create(&self, inputs: &Value) -> Result<ResourceState, TestError> {
        Ok(self.controller.create(inputs, &self.cancel).await?)
    }

    pub async fn read(&self, id: &str) -> Result<ReadOutcome, TestError> {
        Ok(self.controller.read(id, &self.cancel).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), TestError> {
        Ok(self.controller.delete(id, &self.cancel).await?)
    }

    pub async fn import(&self, id: &str) -> Result<ResourceState, TestError> {
        Ok(self.controller.import(id, &self.cancel).await?)
    }

    /// Read `state` back, replacing its outputs with what the API reports.
    async fn refresh(&self, mut state: ResourceState) -> Result<ResourceState, TestError> {
        match self.read(&state.id).await? {
            ReadOutcome::Present(outputs) => {
                state.outputs = outputs;
                Ok(state)
            },
            ReadOutcome::Absent => Err(TestError::Vanished(state.id)),
        }
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: check → plan → create → read.
    ///
    /// Returns the state after read.
    pub async fn lifecycle_create(&self, inputs: Value) -> Result<ResourceState, TestError> {
        let plan = self.plan_create(&inputs).await?;
        expect_phase(&plan, Phase::PendingCreate)?;

        let created = self.create(&inputs).await?;
        self.refresh(created).await
    }

    /// Run a full in-place update lifecycle: plan → update → read.
    ///
    /// A plan with no changes returns `prior` with the new inputs.
    pub async fn lifecycle_update(&self, prior: ResourceState, desired: Value) -> Result<ResourceState, TestError> {
        let changes = match self.plan_update(&prior, &desired).await? {
            Plan::NoChange => return Ok(ResourceState::new(prior.id, desired, prior.outputs)),
            Plan::PendingUpdate(changes) => changes,
            other => return Err(TestError::UnexpectedPlan {
                expected: Phase::PendingUpdate,
                actual: other,
            }),
        };

        let updated = self.controller.update(&prior, &desired, &changes, &self.cancel).await?;
        self.refresh(updated).await
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(&self, state: &ResourceState) -> Result<(), TestError> {
        let plan = self.plan_delete(state).await?;
        expect_phase(&plan, Phase::PendingDelete)?;
        self.delete(&state.id).await
    }

    /// Run a full CRUD lifecycle: create → read → update → read → delete.
    ///
    /// Returns the state after the update (before delete).
    pub async fn lifecycle_crud(&self, initial: Value, updated: Value) -> Result<ResourceState, TestError> {
        let created = self.lifecycle_create(initial).await?;
        let updated = self.lifecycle_update(created, updated).await?;
        self.lifecycle_delete(&updated).await?;
        Ok(updated)
    }
}

/// Why a harness step failed.
#[derive(Debug, Error)]
pub enum TestError {
    /// Input validation reported errors.
    #[error("operation failed with {} diagnostic(s): {}", .0.len(), render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// A lifecycle operation failed.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// Diff planned something other than the step expects.
    #[error("expected plan {expected:?}, got {actual:?}")]
    UnexpectedPlan { expected: Phase, actual: Plan },

    /// The resource could not be read back after a mutation.
    #[error("resource '{0}' was not readable after the operation")]
    Vanished(String),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::message)
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn expect_phase(plan: &Plan, expected: Phase) -> Result<(), TestError> {
    if plan.phase() == expected {
        Ok(())
    } else {
        Err(TestError::UnexpectedPlan {
            expected,
            actual: plan.clone(),
        })
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics for any other plan.
pub fn assert_plan_creates(plan: &Plan) {
    assert!(
        matches!(plan, Plan::PendingCreate),
        "Expected plan to create, but got {:?}",
        plan
    );
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &Plan) {
    assert!(
        plan.is_no_op(),
        "Expected no changes, but got {:?}",
        plan.changes().map(|c| c.fields().collect::<Vec<_>>())
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &Plan) {
    assert!(
        matches!(plan, Plan::PendingReplace(_)),
        "Expected plan to require replacement, but got {:?}",
        plan
    );
}

/// Assert that a plan updates the resource in place.
///
/// # Panics
///
/// Panics for any other plan.
pub fn assert_plan_updates_in_place(plan: &Plan) {
    assert!(
        matches!(plan, Plan::PendingUpdate(_)),
        "Expected plan to update in place, but got {:?}",
        plan
    );
}

/// Assert that a plan changes a specific field.
///
/// # Panics
///
/// Panics if the plan does not change `path`.
pub fn assert_plan_changes_attribute(plan: &Plan, path: &str) {
    let changed: Vec<&str> = plan.changes().map(|c| c.fields().collect()).unwrap_or_default();
    assert!(
        changed.contains(&path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        changed
    );
}

/// Assert that a plan leaves a specific field alone.
///
/// # Panics
///
/// Panics if the plan changes `path`.
pub fn assert_plan_does_not_change_attribute(plan: &Plan, path: &str) {
    let changed = plan.changes().is_some_and(|c| c.fields().any(|f| f == path));
    assert!(
        !changed,
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));
    assert!(
        found,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
