//! Read-only provider functions.
//!
//! A [`ProviderFunction`] is a named lookup that takes no inputs and returns
//! one object fetched with a single `GET` through the shared transport, e.g.
//! the details of the configured API token.

use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::cancel::CancelSignal;
use crate::error::{OperationError, ProviderError};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::transport::{AuthenticatedTransport, RequestSpec};
use crate::types::Operation;

/// A named read-only lookup against one API path.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFunction {
    name: String,
    path: String,
    schema: Schema,
    renames: Vec<(String, String)>,
}

impl ProviderFunction {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            schema: Schema::default(),
            renames: Vec::new(),
        }
    }

    /// Output schema. When set, undeclared response fields are dropped.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Expose the response field `from` as `to` in the output.
    pub fn with_renamed_field(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.push((from.into(), to.into()));
        self
    }

    /// `getTokenInfo`: authorization details of the configured token.
    pub fn token_info() -> Self {
        let ids = || AttributeType::list(AttributeType::String);
        let authorization = AttributeType::object([
            ("id", AttributeType::String),
            ("createdOn", AttributeType::String),
            ("lastUsed", AttributeType::String),
            ("grantType", AttributeType::String),
            ("rateLimit", AttributeType::Int64),
            ("scope", AttributeType::String),
            (
                "authorizedTo",
                AttributeType::object([("siteIds", ids()), ("workspaceIds", ids()), ("userIds", ids())]),
            ),
        ]);
        let application = AttributeType::object([
            ("id", AttributeType::String),
            ("description", AttributeType::String),
            ("homepage", AttributeType::String),
            ("displayName", AttributeType::String),
        ]);
        Self::new("webflow:index:getTokenInfo", "/v2/token/introspect").with_schema(
            Schema::v0()
                .with_description("Authorization details, scopes and rate limit of the configured API token")
                .with_attribute("authorization", Attribute::new(authorization, AttributeFlags::computed()))
                .with_attribute("application", Attribute::new(application, AttributeFlags::computed())),
        )
    }

    /// `getAuthorizedUser`: the user who authorized the configured token.
    pub fn authorized_user() -> Self {
        Self::new("webflow:index:getAuthorizedUser", "/v2/token/authorized_by")
            .with_renamed_field("id", "userId")
            .with_schema(
                Schema::v0()
                    .with_description("The user who authorized the configured API token")
                    .with_attribute("userId", Attribute::computed_string())
                    .with_attribute("email", Attribute::computed_string())
                    .with_attribute("firstName", Attribute::computed_string())
                    .with_attribute("lastName", Attribute::computed_string()),
            )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Fetch the function's output.
    #[instrument(skip_all, name = "function.invoke", fields(function = %self.name))]
    pub async fn invoke(
        &self,
        transport: &AuthenticatedTransport,
        cancel: &CancelSignal,
    ) -> Result<Value, OperationError> {
        let fail = |attempts, err| OperationError::new(Operation::Invoke, &self.name, None, attempts, err);
        if cancel.is_cancelled() {
            return Err(fail(0, ProviderError::Cancelled));
        }

        let mut ctx = transport.retry_context(cancel.clone());
        let response = transport
            .execute(&RequestSpec::get(self.path.clone()), &mut ctx)
            .await
            .map_err(|e| fail(ctx.attempts(), e))?;
        if cancel.is_cancelled() {
            return Err(fail(ctx.attempts(), ProviderError::Cancelled));
        }

        let output = self.shape(response.body).map_err(|e| fail(ctx.attempts(), e))?;
        info!(attempts = ctx.attempts(), "function invoked");
        Ok(output)
    }

    fn shape(&self, body: Value) -> Result<Value, ProviderError> {
        let Value::Object(mut fields) = body else {
            return Err(ProviderError::InvalidResponse(format!(
                "{} expected an object, got: {}",
                self.name, body
            )));
        };
        for (from, to) in &self.renames {
            if let Some(value) = fields.remove(from) {
                fields.insert(to.clone(), value);
            }
        }
        let output: Map<String, Value> = fields
            .into_iter()
            .filter(|(key, value)| {
                !value.is_null() && (self.schema.is_empty() || self.schema.attribute(key).is_some())
            })
            .collect();
        Ok(Value::Object(output))
    }
}
