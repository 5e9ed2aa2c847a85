//! The provider facade: resource kinds registered by type name.
//!
//! The engine talks to the provider in dynamic JSON property bags keyed by a
//! resource type string. [`Provider`] looks up the [`ManagedResource`] for
//! that type and forwards the lifecycle call. Read-only
//! [`ProviderFunction`]s are registered and invoked the same way.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::cancel::CancelSignal;
use crate::config::ProviderConfig;
use crate::diff::ChangeSet;
use crate::error::{OperationError, ProviderError};
use crate::function::ProviderFunction;
use crate::lifecycle::{LifecycleController, ResourceAdapter};
use crate::schema::{ProviderSchema, Schema};
use crate::transport::AuthenticatedTransport;
use crate::types::{ApplyOptions, ApplyOutcome, Operation, Plan, ReadOutcome, ResourceState};

/// Object-safe view of a lifecycle controller.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn type_name(&self) -> &str;

    fn schema(&self) -> Schema;

    fn check(&self, inputs: &Value) -> Result<Value, OperationError>;

    async fn diff(&self, id: Option<&str>, desired: &Value, cancel: &CancelSignal) -> Result<Plan, OperationError>;

    async fn create(&self, inputs: &Value, cancel: &CancelSignal) -> Result<ResourceState, OperationError>;

    async fn read(&self, id: &str, cancel: &CancelSignal) -> Result<ReadOutcome, OperationError>;

    async fn update(
        &self,
        prior: &ResourceState,
        desired: &Value,
        changes: &ChangeSet,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError>;

    async fn delete(&self, id: &str, cancel: &CancelSignal) -> Result<(), OperationError>;

    async fn import(&self, id: &str, cancel: &CancelSignal) -> Result<ResourceState, OperationError>;

    async fn apply(
        &self,
        prior: Option<&ResourceState>,
        desired: &Value,
        options: ApplyOptions,
        cancel: &CancelSignal,
    ) -> Result<ApplyOutcome, OperationError>;
}

#[async_trait]
impl<A: ResourceAdapter + 'static> ManagedResource for LifecycleController<A> {
    fn type_name(&self) -> &str {
        LifecycleController::type_name(self)
    }

    fn schema(&self) -> Schema {
        LifecycleController::schema(self).clone()
    }

    fn check(&self, inputs: &Value) -> Result<Value, OperationError> {
        LifecycleController::check(self, inputs)
    }

    async fn diff(&self, id: Option<&str>, desired: &Value, cancel: &CancelSignal) -> Result<Plan, OperationError> {
        LifecycleController::diff(self, id, desired, cancel).await
    }

    async fn create(&self, inputs: &Value, cancel: &CancelSignal) -> Result<ResourceState, OperationError> {
        LifecycleController::create(self, inputs, cancel).await
    }

    async fn read(&self, id: &str, cancel: &CancelSignal) -> Result<ReadOutcome, OperationError> {
        LifecycleController::read(self, id, cancel).await
    }

    async fn update(
        &self,
        prior: &ResourceState,
        desired: &Value,
        changes: &ChangeSet,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError> {
        LifecycleController::update(self, prior, desired, changes, cancel).await
    }

    async fn delete(&self, id: &str, cancel: &CancelSignal) -> Result<(), OperationError> {
        LifecycleController::delete(self, id, cancel).await
    }

    async fn import(&self, id: &str, cancel: &CancelSignal) -> Result<ResourceState, OperationError> {
        LifecycleController::import(self, id, cancel).await
    }

    async fn apply(
        &self,
        prior: Option<&ResourceState>,
        desired: &Value,
        options: ApplyOptions,
        cancel: &CancelSignal,
    ) -> Result<ApplyOutcome, OperationError> {
        LifecycleController::apply(self, prior, desired, options, cancel).await
    }
}

/// Every resource kind a provider manages, sharing one transport.
pub struct Provider {
    name: String,
    transport: Arc<AuthenticatedTransport>,
    resources: BTreeMap<String, Arc<dyn ManagedResource>>,
    functions: BTreeMap<String, ProviderFunction>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Provider {
    pub fn new(name: impl Into<String>, transport: Arc<AuthenticatedTransport>) -> Self {
        Self {
            name: name.into(),
            transport,
            resources: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    /// Build from the engine's configuration bag, falling back to
    /// `env_token` when no token is configured.
    pub fn from_config(
        name: impl Into<String>,
        config: &Value,
        env_token: Option<String>,
    ) -> Result<Self, ProviderError> {
        let config = ProviderConfig::from_value(config)?;
        let transport = config.build_transport(env_token)?;
        let provider = Self::new(name, Arc::new(transport));
        info!(provider = %provider.name, "provider configured");
        Ok(provider)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &Arc<AuthenticatedTransport> {
        &self.transport
    }

    /// Register `adapter` behind a controller on the shared transport.
    pub fn with_adapter<A: ResourceAdapter + 'static>(self, adapter: A) -> Self {
        let controller = LifecycleController::new(adapter, Arc::clone(&self.transport));
        self.with_resource(Arc::new(controller))
    }

    /// Register a resource. A later registration of the same type wins.
    pub fn with_resource(mut self, resource: Arc<dyn ManagedResource>) -> Self {
        let type_name = resource.type_name().to_string();
        if self.resources.insert(type_name.clone(), resource).is_some() {
            warn!(resource_type = %type_name, "resource type registered twice; keeping the last");
        }
        self
    }

    /// Register a read-only function. A later registration of the same name wins.
    pub fn with_function(mut self, function: ProviderFunction) -> Self {
        let name = function.name().to_string();
        if self.functions.insert(name.clone(), function).is_some() {
            warn!(function = %name, "function registered twice; keeping the last");
        }
        self
    }

    /// Register `getTokenInfo` and `getAuthorizedUser`.
    pub fn with_token_functions(self) -> Self {
        self.with_function(ProviderFunction::token_info())
            .with_function(ProviderFunction::authorized_user())
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Provider config schema plus every registered resource and function schema.
    pub fn schema(&self) -> ProviderSchema {
        let schema = self.resources.iter().fold(
            ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
            |schema, (type_name, resource)| schema.with_resource(type_name.clone(), resource.schema()),
        );
        self.functions.iter().fold(schema, |schema, (name, function)| {
            schema.with_function(name.clone(), function.schema().clone())
        })
    }

    /// Run the function registered as `name` on the shared transport.
    pub async fn invoke(&self, name: &str, cancel: &CancelSignal) -> Result<Value, OperationError> {
        let function = self.functions.get(name).ok_or_else(|| {
            OperationError::new(
                Operation::Invoke,
                name,
                None,
                0,
                ProviderError::UnknownResource(name.to_string()),
            )
        })?;
        function.invoke(&self.transport, cancel).await
    }

    /// The resource registered for `type_name`.
    pub fn resource(&self, type_name: &str) -> Result<&Arc<dyn ManagedResource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn dispatch(
        &self,
        operation: Operation,
        type_name: &str,
        id: Option<&str>,
    ) -> Result<&Arc<dyn ManagedResource>, OperationError> {
        self.resource(type_name)
            .map_err(|e| OperationError::new(operation, type_name, id.map(str::to_string), 0, e))
    }

    pub fn check(&self, type_name: &str, inputs: &Value) -> Result<Value, OperationError> {
        self.dispatch(Operation::Check, type_name, None)?.check(inputs)
    }

    pub async fn diff(
        &self,
        type_name: &str,
        id: Option<&str>,
        desired: &Value,
        cancel: &CancelSignal,
    ) -> Result<Plan, OperationError> {
        self.dispatch(Operation::Diff, type_name, id)?.diff(id, desired, cancel).await
    }

    pub async fn create(
        &self,
        type_name: &str,
        inputs: &Value,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError> {
        self.dispatch(Operation::Create, type_name, None)?.create(inputs, cancel).await
    }

    pub async fn read(&self, type_name: &str, id: &str, cancel: &CancelSignal) -> Result<ReadOutcome, OperationError> {
        self.dispatch(Operation::Read, type_name, Some(id))?.read(id, cancel).await
    }

    pub async fn update(
        &self,
        type_name: &str,
        prior: &ResourceState,
        desired: &Value,
        changes: &ChangeSet,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError> {
        self.dispatch(Operation::Update, type_name, Some(&prior.id))?
            .update(prior, desired, changes, cancel)
            .await
    }

    pub async fn delete(&self, type_name: &str, id: &str, cancel: &CancelSignal) -> Result<(), OperationError> {
        self.dispatch(Operation::Delete, type_name, Some(id))?.delete(id, cancel).await
    }

    pub async fn import(
        &self,
        type_name: &str,
        id: &str,
        cancel: &CancelSignal,
    ) -> Result<ResourceState, OperationError> {
        self.dispatch(Operation::Import, type_name, Some(id))?.import(id, cancel).await
    }

    pub async fn apply(
        &self,
        type_name: &str,
        prior: Option<&ResourceState>,
        desired: &Value,
        options: ApplyOptions,
        cancel: &CancelSignal,
    ) -> Result<ApplyOutcome, OperationError> {
        let id = prior.map(|s| s.id.as_str());
        self.dispatch(Operation::Apply, type_name, id)?
            .apply(prior, desired, options, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::IdFormat;
    use crate::rest::RestResource;
    use crate::schema::Attribute;
    use reqwest::Method;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "wf_test_0123456789abcdef0123456789abcdef";

    fn webhooks() -> RestResource {
        RestResource::new(
            "webflow:index:Webhook",
            IdFormat::collection("webhooks"),
            "/v2/sites/{scope}/webhooks/{id}",
        )
        .with_scope_field("siteId")
        .with_create(Method::POST, "/v2/sites/{scope}/webhooks")
        .with_schema(
            Schema::v0()
                .with_attribute("siteId", Attribute::required_string().replace_on_change())
                .with_attribute("triggerType", Attribute::required_string().replace_on_change())
                .with_attribute("url", Attribute::required_string().replace_on_change()),
        )
    }

    fn sites() -> RestResource {
        RestResource::new("webflow:index:Site", IdFormat::Root, "/v2/sites/{id}")
            .with_create(Method::POST, "/v2/workspaces/w1/sites")
            .with_schema(Schema::v0().with_attribute("displayName", Attribute::required_string()))
    }

    fn provider(server: &MockServer) -> Provider {
        Provider::from_config(
            "webflow",
            &json!({"apiToken": TOKEN, "baseUrl": server.uri(), "allowInsecureHttp": true, "maxRetries": 0}),
            None,
        )
        .unwrap()
        .with_adapter(webhooks())
        .with_adapter(sites())
    }

    #[tokio::test]
    async fn test_schema_lists_registered_types() {
        let server = MockServer::start().await;
        let provider = provider(&server);
        assert_eq!(
            provider.resource_types().collect::<Vec<_>>(),
            vec!["webflow:index:Site", "webflow:index:Webhook"]
        );
        let schema = provider.schema();
        assert!(schema.resources.contains_key("webflow:index:Webhook"));
        assert!(schema.provider.attribute("apiToken").is_some());
    }

    #[tokio::test]
    async fn test_dispatch_by_type_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/sites/s1/webhooks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "wh1",
                "triggerType": "form_submission",
                "url": "https://example.com/hook"
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let inputs = json!({"siteId": "s1", "triggerType": "form_submission", "url": "https://example.com/hook"});
        let state = provider
            .create("webflow:index:Webhook", &inputs, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(state.id, "s1/webhooks/wh1");
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let server = MockServer::start().await;
        let provider = provider(&server);
        let err = provider
            .read("webflow:index:Nope", "x", &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err.error(), ProviderError::UnknownResource(t) if t == "webflow:index:Nope"));
        assert_eq!(err.attempts, 0);
        assert!(provider.check("webflow:index:Nope", &json!({})).is_err());
    }

    #[tokio::test]
    async fn test_dispatch_apply_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/sites/s9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "s9", "displayName": "Docs"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v2/sites/s9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = provider(&server);
        let cancel = CancelSignal::never();
        let state = provider.import("webflow:index:Site", "s9", &cancel).await.unwrap();
        assert_eq!(state.inputs, json!({"displayName": "Docs"}));

        let outcome = provider
            .apply("webflow:index:Site", Some(&state), &state.inputs, ApplyOptions::default(), &cancel)
            .await
            .unwrap();
        assert!(outcome.plan.is_no_op());

        provider.delete("webflow:index:Site", "s9", &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_registered_function() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/token/authorized_by"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "u1", "email": "ops@example.com"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server).with_token_functions();
        assert_eq!(
            provider.function_names().collect::<Vec<_>>(),
            vec!["webflow:index:getAuthorizedUser", "webflow:index:getTokenInfo"]
        );
        assert!(provider.schema().functions.contains_key("webflow:index:getTokenInfo"));

        let output = provider
            .invoke("webflow:index:getAuthorizedUser", &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(output, json!({"userId": "u1", "email": "ops@example.com"}));

        let err = provider
            .invoke("webflow:index:getNothing", &CancelSignal::never())
            .await
            .unwrap_err();
        assert_eq!(err.operation, Operation::Invoke);
        assert!(matches!(err.error(), ProviderError::UnknownResource(_)));
        assert_eq!(err.attempts, 0);
    }

    #[test]
    fn test_from_config_requires_token() {
        let err = Provider::from_config("webflow", &json!({}), None).unwrap_err();
        assert!(err.to_string().contains("WEBFLOW_AUTH_001"));
    }
}
