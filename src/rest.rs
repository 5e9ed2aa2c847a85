//! A declarative [`ResourceAdapter`] for the common REST shapes.
//!
//! Most platform resources follow one of a few layouts:
//!
//! - `POST /v2/sites/{scope}/webhooks`, then `GET|PATCH|DELETE .../{id}`
//! - no item endpoint, so reads list the collection and pick the item
//!   (`GET /v2/sites/{scope}/redirects` returns `{"redirects": [...]}`)
//! - a singleton written with `PUT` (`/v2/sites/{scope}/robots_txt`)
//!
//! [`RestResource`] covers these from path templates. `{scope}` expands to
//! the parent scope and `{id}` to the local id, each percent-encoded as a
//! single path segment.

use reqwest::{Method, Url};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::identifier::{check_scope, IdError, IdFormat, ResourceId};
use crate::lifecycle::{observed_outputs, ResourceAdapter};
use crate::schema::{Diagnostic, Schema};
use crate::transport::{ApiResponse, RequestSpec};

/// Extra input rules beyond the schema.
pub type Validator = fn(&Value) -> Vec<Diagnostic>;

#[derive(Debug, Clone, PartialEq)]
struct ListRead {
    path: String,
    field: String,
}

/// A resource adapter configured from endpoint templates.
#[derive(Debug, Clone)]
pub struct RestResource {
    type_name: String,
    id_format: IdFormat,
    schema: Schema,
    scope_field: Option<String>,
    id_field: String,
    create: Option<(Method, String)>,
    item_path: String,
    list_read: Option<ListRead>,
    update_method: Method,
    validator: Option<Validator>,
}

impl RestResource {
    pub fn new(type_name: impl Into<String>, id_format: IdFormat, item_path: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id_format,
            schema: Schema::default(),
            scope_field: None,
            id_field: "id".to_string(),
            create: None,
            item_path: item_path.into(),
            list_read: None,
            update_method: Method::PATCH,
            validator: None,
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// The input field carrying the parent scope. It is kept out of
    /// request bodies.
    pub fn with_scope_field(mut self, field: impl Into<String>) -> Self {
        self.scope_field = Some(field.into());
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_create(mut self, method: Method, path: impl Into<String>) -> Self {
        self.create = Some((method, path.into()));
        self
    }

    /// Read by listing `path` and finding the item in the array at `field`.
    pub fn with_list_read(mut self, path: impl Into<String>, field: impl Into<String>) -> Self {
        self.list_read = Some(ListRead {
            path: path.into(),
            field: field.into(),
        });
        self
    }

    /// `PATCH` sends the changed fields; `PUT` sends the full inputs.
    pub fn with_update_method(mut self, method: Method) -> Self {
        self.update_method = method;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn scope_from_inputs<'a>(&self, inputs: &'a Value) -> Result<Option<&'a str>, ProviderError> {
        let Some(field) = &self.scope_field else {
            return Ok(None);
        };
        let scope = inputs
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Validation(format!("missing scope field '{}'", field)))?;
        check_scope(scope).map_err(|e| ProviderError::Validation(format!("{}: {}", field, e)))?;
        Ok(Some(scope))
    }

    fn without_scope(&self, fields: &Map<String, Value>) -> Value {
        let mut body = fields.clone();
        if let Some(field) = &self.scope_field {
            body.remove(field);
        }
        Value::Object(body)
    }

    fn item(&self, id: &ResourceId) -> Result<String, ProviderError> {
        render(&self.item_path, id.scope(), id.local_id())
    }
}

/// Expand `{scope}` and `{id}` in a path template.
///
/// Each value becomes exactly one encoded path segment, so a `/` or `..`
/// inside an id can never address a different endpoint.
pub fn render(template: &str, scope: Option<&str>, local_id: Option<&str>) -> Result<String, ProviderError> {
    let mut path = template.to_string();
    for (placeholder, part, value) in [("{scope}", "scope", scope), ("{id}", "local id", local_id)] {
        if !path.contains(placeholder) {
            continue;
        }
        let value = value.ok_or_else(|| {
            ProviderError::Configuration(format!("path '{}' needs a value for {}", template, placeholder))
        })?;
        path = path.replace(placeholder, &path_segment(part, value)?);
    }
    Ok(path)
}

fn path_segment(part: &'static str, value: &str) -> Result<String, ProviderError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(IdError::InvalidPart {
            part,
            reason: format!("'{}' is not a valid path segment", value),
        }
        .into());
    }
    let mut url = Url::parse("http://segment.invalid/")
        .map_err(|e| ProviderError::Configuration(format!("cannot encode path segment: {}", e)))?;
    url.path_segments_mut()
        .map_err(|()| ProviderError::Configuration("cannot encode path segment".to_string()))?
        .pop_if_empty()
        .push(value);
    Ok(url.path().trim_start_matches('/').to_string())
}

impl ResourceAdapter for RestResource {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn id_format(&self) -> IdFormat {
        self.id_format.clone()
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn validate(&self, inputs: &Value) -> Vec<Diagnostic> {
        self.validator.map(|rules| rules(inputs)).unwrap_or_default()
    }

    fn scope_field(&self) -> Option<&str> {
        self.scope_field.as_deref()
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn create_request(&self, inputs: &Value) -> Result<RequestSpec, ProviderError> {
        let (method, template) = self.create.as_ref().ok_or_else(|| {
            ProviderError::Configuration(format!("{} has no create endpoint", self.type_name))
        })?;
        let scope = self.scope_from_inputs(inputs)?;
        let path = render(template, scope, None)?;
        let body = self.without_scope(inputs.as_object().unwrap_or(&Map::new()));
        Ok(RequestSpec::new(method.clone(), path).with_body(body))
    }

    fn read_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError> {
        match &self.list_read {
            Some(list) => Ok(RequestSpec::get(render(&list.path, id.scope(), None)?)),
            None => Ok(RequestSpec::get(self.item(id)?)),
        }
    }

    fn update_request(
        &self,
        id: &ResourceId,
        patch: &Map<String, Value>,
        desired: &Value,
    ) -> Result<RequestSpec, ProviderError> {
        let body = if self.update_method == Method::PUT {
            self.without_scope(desired.as_object().unwrap_or(&Map::new()))
        } else {
            self.without_scope(patch)
        };
        Ok(RequestSpec::new(self.update_method.clone(), self.item(id)?).with_body(body))
    }

    fn delete_request(&self, id: &ResourceId) -> Result<RequestSpec, ProviderError> {
        Ok(RequestSpec::delete(self.item(id)?))
    }

    fn parse_read(&self, id: &ResourceId, response: &ApiResponse) -> Result<Option<Value>, ProviderError> {
        let scope = self.scope_field().zip(id.scope());
        let Some(list) = &self.list_read else {
            return match &response.body {
                Value::Null => Ok(None),
                body @ Value::Object(_) => Ok(Some(observed_outputs(body, &self.schema, &self.id_field, scope))),
                other => Err(ProviderError::InvalidResponse(format!(
                    "expected an object from read, got: {}",
                    other
                ))),
            };
        };

        let items = match response.body.get(&list.field) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(None),
            Some(other) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "expected '{}' to be an array, got: {}",
                    list.field, other
                )))
            },
        };
        let wanted = id.local_id().unwrap_or_default();
        let found = items.iter().find(|item| match item.get(&self.id_field) {
            Some(Value::String(s)) => s == wanted,
            Some(Value::Number(n)) => n.to_string() == wanted,
            _ => false,
        });
        Ok(found.map(|item| observed_outputs(item, &self.schema, &self.id_field, scope)))
    }
}
