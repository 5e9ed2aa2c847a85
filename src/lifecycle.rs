//! The generic resource lifecycle.
//!
//! A [`ResourceAdapter`] describes one resource kind: how its identifier is
//! shaped, which fields exist, and how to turn lifecycle steps into API
//! requests and API responses back into state. [`LifecycleController`]
//! implements check, diff, create, read, update, delete, import and apply
//! once for every adapter, on top of the retrying
//! [`AuthenticatedTransport`].
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = Arc::new(AuthenticatedTransport::new(credential, TransportConfig::default())?);
//! let sites = LifecycleController::new(SiteAdapter, transport);
//!
//! let inputs = sites.check(&json!({"displayName": "Marketing"}))?;
//! let state = sites.create(&inputs, &CancelSignal::never()).await?;
//! ```

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelSignal;
use crate::diff::{diff, ChangeSet, FieldPolicies, FieldPolicy};
use crate::error::{OperationError, ProviderError};
use crate::identifier::{check_scope, IdFormat, ResourceId};
use crate::logging::loggable_fields;
use crate::schema::{Diagnostic, Schema};
use crate::transport::{ApiResponse, AuthenticatedTransport, RequestSpec};
use crate::types::{ApplyOptions, ApplyOutcome, Operation, Phase, Plan, ReadOutcome, ResourceState};
use crate::validation::validate;

/// Everything the controller needs to know about one resource kind.
///
/// Only the request builders are required. The response parsers have
/// defaults driven by [`id_format`](Self::id_format),
/// [`scope_field`](Self::scope_field) and [`schema`](Self::schema).
pub trait ResourceAdapter: Send + Sync {
    /// Type name the engine uses, e.g. `webflow:index:Redirect`.
    fn type_name(&self) -> &str;

    /// Shape of this kind's identifiers.
    fn id_format(&self) -> IdFormat;

    /// Declared attributes. An empty schema disables structural checks.
    fn schema(&self) -> Schema {
        Schema::default()
    }

    /// Field policies for drift detection.
    fn field_policies(&self) -> FieldPolicies {
        FieldPolicies::from_schema(&self.schema())
    }

    /// Business rules, run after the structural checks pass.
    fn validate(&self, _inputs: &Value) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Input field holding the parent scope, e.g. `siteId`.
    fn scope_field(&self) -> Option<&str> {
        None
    }

    /// Response field holding the platform-assigned id.
    fn id_field(&self) -> &str {
        "id"
    }

    fn create_request(&self, inputs: &Value) -> Result<RequestSpec, ProviderError>;

    fn read_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError>;

    /// `patch` holds only the changed fields; `desired` the full inputs.
    fn update_request(
        &self,
        id: &ResourceId,
        patch: &Map<String, Value>,
        desired: &Value,
    ) -> Result<RequestSpec, ProviderError>;

    fn delete_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError>;

    /// Build the identifier and the observed outputs of a new resource.
    fn parse_create(
        &self,
        inputs: &Value,
        response: &ApiResponse,
    ) -> Result<(ResourceId, Value), ProviderError> {
        let scope = match self.scope_field() {
            Some(field) => Some(inputs.get(field).and_then(Value::as_str).ok_or_else(|| {
                ProviderError::Validation(format!("missing scope field '{}'", field))
            })?),
            None => None,
        };
        let local_id = match self.id_format() {
            IdFormat::Singleton { .. } => None,
            _ => Some(extract_id(&response.body, self.id_field())?),
        };
        let id = self.id_format().build(scope, local_id.as_deref()).map_err(|e| {
            ProviderError::InvalidResponse(format!("created resource has an unusable id: {}", e))
        })?;
        let outputs = merge_outputs(
            inputs.as_object().cloned().unwrap_or_default(),
            &response.body,
            &self.schema(),
            self.id_field(),
        );
        Ok((id, outputs))
    }

    /// Observed outputs from a read response; `None` means absent.
    fn parse_read(&self, id: &ResourceId, response: &ApiResponse) -> Result<Option<Value>, ProviderError> {
        if response.body.is_null() {
            return Ok(None);
        }
        if !response.body.is_object() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected an object from read, got: {}",
                response.body
            )));
        }
        Ok(Some(observed_outputs(
            &response.body,
            &self.schema(),
            self.id_field(),
            self.scope_field().zip(id.scope()),
        )))
    }

    /// Observed outputs after an in-place update.
    fn parse_update(
        &self,
        prior_outputs: &Value,
        patch: &Map<String, Value>,
        response: &ApiResponse,
    ) -> Result<Value, ProviderError> {
        let mut outputs = prior_outputs.as_object().cloned().unwrap_or_default();
        for (field, value) in patch {
            if value.is_null() {
                outputs.remove(field);
            } else {
                outputs.insert(field.clone(), value.clone());
            }
        }
        Ok(merge_outputs(outputs, &response.body, &self.schema(), self.id_field()))
    }

    /// Desired inputs reconstructed for an imported resource.
    fn import_inputs(&self, _id: &ResourceId, outputs: &Value) -> Value {
        let policies = self.field_policies();
        match outputs.as_object() {
            Some(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| policies.get(k) != FieldPolicy::OutputOnly)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            None => outputs.clone(),
        }
    }
}

impl<A: ResourceAdapter + ?Sized> ResourceAdapter for Arc<A> {
    fn type_name(&self) -> &str {
        (**self).type_name()
    }
    fn id_format(&self) -> IdFormat {
        (**self).id_format()
    }
    fn schema(&self) -> Schema {
        (**self).schema()
    }
    fn field_policies(&self) -> FieldPolicies {
        (**self).field_policies()
    }
    fn validate(&self, inputs: &Value) -> Vec<Diagnostic> {
        (**self).validate(inputs)
    }
    fn scope_field(&self) -> Option<&str> {
        (**self).scope_field()
    }
    fn id_field(&self) -> &str {
        (**self).id_field()
    }
    fn create_request(&self, inputs: &Value) -> Result<RequestSpec, ProviderError> {
        (**self).create_request(inputs)
    }
    fn read_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError> {
        (**self).read_request(id)
    }
    fn update_request(
        &self,
        id: &ResourceId,
        patch: &Map<String, Value>,
        desired: &Value,
    ) -> Result<RequestSpec, ProviderError> {
        (**self).update_request(id, patch, desired)
    }
    fn delete_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError> {
        (**self).delete_request(id)
    }
    fn parse_create(
        &self,
        inputs: &Value,
        response: &ApiResponse,
    ) -> Result<(ResourceId, Value), ProviderError> {
        (**self).parse_create(inputs, response)
    }
    fn parse_read(&self, id: &ResourceId, response: &ApiResponse) -> Result<Option<Value>, ProviderError> {
        (**self).parse_read(id, response)
    }
    fn parse_update(
        &self,
        prior_outputs: &Value,
        patch: &Map<String, Value>,
        response: &ApiResponse,
    ) -> Result<Value, ProviderError> {
        (**self).parse_update(prior_outputs, patch, response)
    }
    fn import_inputs(&self, id: &ResourceId, outputs: &Value) -> Value {
        (**self).import_inputs(id, outputs)
    }
}

pub(crate) fn extract_id(body: &Value, field: &str) -> Result<String, ProviderError> {
    match body.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProviderError::InvalidResponse(format!(
            "response has no '{}' field: {}",
            field, body
        ))),
    }
}

/// Overlay response fields onto `base`: declared attributes only, or every
/// field when the schema is empty. The id field and nulls are skipped.
pub(crate) fn merge_outputs(mut base: Map<String, Value>, body: &Value, schema: &Schema, id_field: &str) -> Value {
    base.retain(|_, v| !v.is_null());
    if let Some(fields) = body.as_object() {
        for (key, value) in fields {
            if key == id_field || value.is_null() {
                continue;
            }
            if schema.is_empty() || schema.attribute(key).is_some() {
                base.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(base)
}

/// Outputs of one observed item, with the scope field restored from the id.
pub(crate) fn observed_outputs(
    item: &Value,
    schema: &Schema,
    id_field: &str,
    scope: Option<(&str, &str)>,
) -> Value {
    let mut outputs = merge_outputs(Map::new(), item, schema, id_field);
    if let (Some((field, scope)), Value::Object(map)) = (scope, &mut outputs) {
        map.insert(field.to_string(), Value::String(scope.to_string()));
    }
    outputs
}

/// Generic check/diff/create/read/update/delete over one adapter.
#[derive(Debug)]
pub struct LifecycleController<A> {
    adapter: A,
    transport: Arc<AuthenticatedTransport>,
    schema: Schema,
    policies: FieldPolicies,
}

impl<A: ResourceAdapter> LifecycleController<A> {
    /// A controller for `adapter` sharing `transport` with other controllers.
    pub fn new(adapter: A, transport: Arc<AuthenticatedTransport>) -> Self {
        let schema = adapter.schema();
        let policies = adapter.field_policies();
        Self {
            adapter,
            transport,
            schema,
            policies,
        }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    pub fn type_name(&self) -> &str {
        self.adapter.type_name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn field_policies(&self) -> &FieldPolicies {
        &self.policies
    }

    fn fail(&self, operation: Operation, id: Option<&str>, attempts: u32, err: ProviderError) -> OperationError {
        warn!(
            resource_type = %self.type_name(),
            operation = %operation,
            id = id.unwrap_or(""),
            attempts,
            error = %err,
            "operation failed"
        );
        OperationError::new(operation, self.type_name(), id.map(str::to_string), attempts, err)
    }

    fn decode(&self, operation: Operation, id: &str) -> Result<ResourceId, OperationError> {
        self.adapter
            .id_format()
            .decode(id)
            .map_err(|e| self.fail(operation, Some(id), 0, e.into()))
    }

    fn ensure_not_cancelled(
        &self,
        operation: Operation,
        id: Option<&str>,
        cancel: &CancelSignal,
    ) -> Result<(), OperationError> {
        if cancel.is_cancelled() {
            return Err(self.fail(operation, id, 0, ProviderError::Cancelled));
        }
        Ok(())
    }

    /// Every finding for `inputs`: schema checks, the scope value, then the
    /// adapter's rules.
    pub fn diagnostics(&self, inputs: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validate(&self.schema, inputs);
        if let Some(field) = self.adapter.scope_field() {
            if let Some(Err(e)) = inputs.get(field).and_then(Value::as_str).map(check_scope) {
                diagnostics.push(Diagnostic::error(e.to_string()).with_attribute(field));
            }
        }
        if !diagnostics.iter().any(Diagnostic::is_error) {
            diagnostics.extend(self.adapter.validate(inputs));
        }
        diagnostics
    }

    /// Validate `inputs` and return them unchanged.
    ///
    /// The error names the first offending field and lists every other
    /// problem after it.
    #[instrument(skip_all, name = "lifecycle.check", fields(resource_type = %self.type_name()))]
    pub fn check(&self, inputs: &Value) -> Result<Value, OperationError> {
        self.check_as(Operation::Check, inputs)
    }

    fn check_as(&self, operation: Operation, inputs: &Value) -> Result<Value, OperationError> {
        let diagnostics = self.diagnostics(inputs);
        for warning in diagnostics.iter().filter(|d| !d.is_error()) {
            warn!(resource_type = %self.type_name(), warning = %warning.message(), "input warning");
        }
        let errors: Vec<String> = diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(Diagnostic::message)
            .collect();
        if errors.is_empty() {
            Ok(inputs.clone())
        } else {
            Err(self.fail(operation, None, 0, ProviderError::Validation(errors.join("; "))))
        }
    }

    /// Decide what must happen to bring the resource to `desired`.
    ///
    /// No id means the resource was never created. A `null` desired value
    /// means the resource is no longer wanted.
    #[instrument(skip_all, name = "lifecycle.diff", fields(resource_type = %self.type_name(), id = id.unwrap_or("")))]
    pub async fn diff(
        &self,
        id: Option<&str>,
        desired: &Value,
        cancel: &CancelSignal,
    ) -> Result<Plan, OperationError> {
        let id = id.filter(|id| !id.is_empty());
        let Some(id) = id else {
            return Ok(if desired.is_null() {
                Plan::NoChange
            } else {
                Plan::PendingCreate
            });
        };
        self.decode(Operation::Diff, id)?;
        if desired.is_null() {
            return Ok(Plan::PendingDelete);
        }

        let observed = match self.read_as(Operation::Diff, id, cancel).await? {
            ReadOutcome::Absent => {
                info!(id, "resource is gone remotely; planning recreate");
                return Ok(Plan::PendingCreate);
            },
            ReadOutcome::Present(outputs) => outputs,
        };
        Ok(self.plan_against(desired, &observed))
    }

    /// Compare `desired` with already observed outputs, without any I/O.
    pub fn plan_against(&self, desired: &Value, observed: &Value) -> Plan {
        let changes = diff(desired, observed, &self.policies);
        debug!(changes = %changes, "computed drift");
        if changes.is_empty() {
            Plan::NoChange
        } else if changes.requires_replace() {
            Plan::PendingReplace(changes)
        } else {
            Plan::PendingUpdate(changes)
        }
    }

    /// Create the resource. On failure nothing is returned to persist.
    #[instrument(skip_all, name = "lifecycle.create", fields(resource_type = %self.type_name()))]
    pub async fn create(&self, inputs: &Value, cancel: &CancelSignal) -> Result<ResourceState, OperationError> {
        let inputs = self.check_as(Operation::Create, inputs)?;
        self.ensure_not_cancelled(Operation::Create, None, cancel)?;
        let fail = |attempts, err| self.fail(Operation::Create, None, attempts, err);

        debug!(inputs = %loggable_fields(&inputs, &self.schema), "creating resource");
        let request = self.adapter.create_request(&inputs).map_err(|e| fail(0, e))?;
        let mut ctx = self.transport.retry_context(cancel.clone());
        let response = self
            .transport
            .execute(&request, &mut ctx)
            .await
            .map_err(|e| fail(ctx.attempts(), e))?;
        if cancel.is_cancelled() {
            return Err(fail(ctx.attempts(), ProviderError::Cancelled));
        }

        let (id, outputs) = self
            .adapter
            .parse_create(&inputs, &response)
            .map_err(|e| fail(ctx.attempts(), e))?;
        let id = id.encode();
        info!(id = %id, attempts = ctx.attempts(), "resource created");
        Ok(ResourceState::new(id, inputs, outputs))
    }

    /// Read the resource. A 404 is [`ReadOutcome::Absent`], not an error.
    #[instrument(skip_all, name = "lifecycle.read", fields(resource_type = %self.type_name(), id = %id))]
    pub async fn read(&self, id: &str, cancel: &CancelSignal) -> Result<ReadOutcome, OperationError> {
        self.read_as(Operation::Read, id, cancel).await
    }

    async fn read_as(
        &self,
        operation: Operation,
        id: &str,
        cancel: &CancelSignal,
    ) -> Result<ReadOutcome, OperationError> {
        let resource_id = self.decode(operation, id)?;
        self.ensure_not_cancelled(operation, Some(id), cancel)?;
        let fail = |attempts, err| self.fail(operation, Some(id), attempts, err);

        let request = self.adapter.read_request(&resource_id).map_err(|e| fail(0, e))?;
        let mut ctx = self.transport.retry_context(cancel.clone());
        let response = match self.transport.execute(&request, &mut ctx).await {
            Ok(response) => response,
            Err(ProviderError::NotFound(_)) => {
                debug!(id, "resource absent");
                return Ok(ReadOutcome::Absent);
            },
            Err(e) => return Err(fail(ctx.attempts(), e)),
        };
        if cancel.is_cancelled() {
            return Err(fail(ctx.attempts(), ProviderError::Cancelled));
        }

        match self.adapter.parse_read(&resource_id, &response) {
            Ok(Some(outputs)) => Ok(ReadOutcome::Present(outputs)),
            Ok(None) => Ok(ReadOutcome::Absent),
            Err(e) => Err(fail(ctx.attempts(), e)),
        }
    }

    /// Apply `changes` in place, sending only the changed fields.
    ///
    /// `prior` is never modified; on failure it is still the state to keep.
    #[instrument(skip_all, name = "lifecycle.update", fields(resource_type = %self.type_name(), id = %prior.id))]
    pub async fn update(
        &self,
        prior: &ResourceState,
        desired: &Value,
        changes: &ChangeSet,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError> {
        let id = prior.id.as_str();
        let resource_id = self.decode(Operation::Update, id)?;
        let desired = self
            .check_as(Operation::Update, desired)
            .map_err(|e| OperationError { resource_id: Some(id.to_string()), ..e })?;
        let fail = |attempts, err| self.fail(Operation::Update, Some(id), attempts, err);

        if let Some(reason) = changes.replace_reason() {
            return Err(fail(0, ProviderError::ReplacementRequired(reason.to_string())));
        }
        if changes.is_empty() {
            debug!("nothing to update");
            return Ok(ResourceState::new(id, desired, prior.outputs.clone()));
        }
        self.ensure_not_cancelled(Operation::Update, Some(id), cancel)?;

        let patch = changes.patch();
        debug!(patch = %loggable_fields(&serde_json::Value::Object(patch.clone()), &self.schema), "updating resource");
        let request = self
            .adapter
            .update_request(&resource_id, &patch, &desired)
            .map_err(|e| fail(0, e))?;
        let mut ctx = self.transport.retry_context(cancel.clone());
        let response = self
            .transport
            .execute(&request, &mut ctx)
            .await
            .map_err(|e| fail(ctx.attempts(), e))?;
        if cancel.is_cancelled() {
            return Err(fail(ctx.attempts(), ProviderError::Cancelled));
        }

        let outputs = self
            .adapter
            .parse_update(&prior.outputs, &patch, &response)
            .map_err(|e| fail(ctx.attempts(), e))?;
        info!(changes = %changes, attempts = ctx.attempts(), "resource updated");
        Ok(ResourceState::new(id, desired, outputs))
    }

    /// Delete the resource. Already gone counts as success.
    #[instrument(skip_all, name = "lifecycle.delete", fields(resource_type = %self.type_name(), id = %id))]
    pub async fn delete(&self, id: &str, cancel: &CancelSignal) -> Result<(), OperationError> {
        let resource_id = self.decode(Operation::Delete, id)?;
        self.ensure_not_cancelled(Operation::Delete, Some(id), cancel)?;
        let fail = |attempts, err| self.fail(Operation::Delete, Some(id), attempts, err);

        let request = self.adapter.delete_request(&resource_id).map_err(|e| fail(0, e))?;
        let mut ctx = self.transport.retry_context(cancel.clone());
        match self.transport.execute(&request, &mut ctx).await {
            Ok(_) => {
                if cancel.is_cancelled() {
                    return Err(fail(ctx.attempts(), ProviderError::Cancelled));
                }
                info!(id, attempts = ctx.attempts(), "resource deleted");
                Ok(())
            },
            Err(ProviderError::NotFound(_)) => {
                info!(id, "resource already deleted");
                Ok(())
            },
            Err(e) => Err(fail(ctx.attempts(), e)),
        }
    }

    /// Adopt an existing resource by id.
    #[instrument(skip_all, name = "lifecycle.import", fields(resource_type = %self.type_name(), id = %id))]
    pub async fn import(&self, id: &str, cancel: &CancelSignal) -> Result<ResourceState, OperationError> {
        let resource_id = self.decode(Operation::Import, id)?;
        match self.read_as(Operation::Import, id, cancel).await? {
            ReadOutcome::Present(outputs) => {
                let inputs = self.adapter.import_inputs(&resource_id, &outputs);
                info!(id, "resource imported");
                Ok(ResourceState::new(id, inputs, outputs))
            },
            ReadOutcome::Absent => Err(self.fail(
                Operation::Import,
                Some(id),
                1,
                ProviderError::NotFound(id.to_string()),
            )),
        }
    }

    /// Run one full reconciliation pass from `prior` towards `desired`.
    ///
    /// Replacement deletes the old resource before creating the new one.
    /// With [`ApplyOptions::dry_run`] the pass stops after planning.
    #[instrument(skip_all, name = "lifecycle.apply", fields(resource_type = %self.type_name()))]
    pub async fn apply(
        &self,
        prior: Option<&ResourceState>,
        desired: &Value,
        options: ApplyOptions,
        cancel: &CancelSignal,
    ) -> Result<ApplyOutcome, OperationError> {
        let mut phase = Phase::Unmanaged;
        let desired = if desired.is_null() {
            Value::Null
        } else {
            self.check(desired)?
        };
        advance(&mut phase, Phase::Checked);

        let plan = self.diff(prior.map(|s| s.id.as_str()), &desired, cancel).await?;
        advance(&mut phase, plan.phase());

        if options.dry_run || plan.is_no_op() {
            let state = prior.map(|s| ResourceState::new(s.id.clone(), desired.clone(), s.outputs.clone()));
            info!(phase = ?phase, dry_run = options.dry_run, "plan computed");
            return Ok(ApplyOutcome {
                plan,
                phase,
                state: state.filter(|_| !desired.is_null()),
            });
        }

        advance(&mut phase, Phase::Applying);
        let result = self.apply_plan(&plan, prior, &desired, cancel).await;
        let state = match result {
            Ok(state) => state,
            Err(e) => {
                advance(&mut phase, Phase::Failed);
                return Err(e);
            },
        };

        let state = match state {
            Some(state) => Some(self.refresh(state, cancel).await?),
            None => None,
        };
        advance(&mut phase, Phase::Committed);
        Ok(ApplyOutcome { plan, phase, state })
    }

    async fn apply_plan(
        &self,
        plan: &Plan,
        prior: Option<&ResourceState>,
        desired: &Value,
        cancel: &CancelSignal,
    ) -> Result<Option<ResourceState>, OperationError> {
        let prior_state = || {
            prior.ok_or_else(|| {
                self.fail(
                    Operation::Update,
                    None,
                    0,
                    ProviderError::Validation("no prior state to update".to_string()),
                )
            })
        };
        match plan {
            Plan::NoChange => Ok(prior.cloned()),
            Plan::PendingCreate => self.create(desired, cancel).await.map(Some),
            Plan::PendingUpdate(changes) => {
                let prior = prior_state()?;
                self.update(prior, desired, changes, cancel).await.map(Some)
            },
            Plan::PendingReplace(changes) => {
                let prior = prior_state()?;
                info!(reason = changes.replace_reason().unwrap_or(""), "replacing resource");
                self.delete(&prior.id, cancel).await?;
                self.create(desired, cancel).await.map(Some)
            },
            Plan::PendingDelete => {
                let prior = prior_state()?;
                self.delete(&prior.id, cancel).await.map(|()| None)
            },
        }
    }

    /// Re-read after a mutation so the committed outputs are what the
    /// platform now reports.
    async fn refresh(&self, mut state: ResourceState, cancel: &CancelSignal) -> Result<ResourceState, OperationError> {
        match self.read(&state.id, cancel).await? {
            ReadOutcome::Present(outputs) => state.outputs = outputs,
            ReadOutcome::Absent => debug!(id = %state.id, "not readable yet; keeping create outputs"),
        }
        Ok(state)
    }
}

fn advance(phase: &mut Phase, next: Phase) {
    debug_assert!(phase.can_transition_to(next), "{:?} -> {:?}", phase, next);
    debug!(from = ?*phase, to = ?next, "phase transition");
    *phase = next;
}
