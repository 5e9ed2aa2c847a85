//! Checking desired inputs against a [`Schema`].
//!
//! This is the structural half of the `check` operation; adapter-specific
//! business rules run afterwards through
//! [`ResourceAdapter::validate`](crate::lifecycle::ResourceAdapter::validate).
//!
//! # Example
//!
//! ```
//! use webflow_provider_sdk::schema::{Attribute, Schema};
//! use webflow_provider_sdk::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("sourcePath", Attribute::required_string())
//!     .with_attribute("statusCode", Attribute::required_int64());
//!
//! assert!(validate(&schema, &json!({"sourcePath": "/old", "statusCode": 301})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"sourcePath": "/old", "statusCode": "301"}));
//! assert_eq!(diagnostics[0].attribute.as_deref(), Some("statusCode"));
//! ```

use serde_json::{Map, Value};

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};

/// Check `inputs` against `schema`, returning every finding.
///
/// - the inputs must be a JSON object
/// - required attributes must be present and non-null
/// - present values must match their declared type, recursively
/// - attributes the schema does not declare are rejected (an empty schema
///   accepts anything)
/// - output-only attributes may not be set
///
/// Diagnostics follow the schema's attribute order, then unknown keys in
/// input order.
pub fn validate(schema: &Schema, inputs: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let Some(obj) = inputs.as_object() else {
        diagnostics.push(
            Diagnostic::error("Resource inputs must be an object")
                .with_detail(format!("got {}", value_type_name(inputs))),
        );
        return diagnostics;
    };

    for (name, attr) in &schema.attributes {
        check_attribute(name, attr, obj.get(name), &mut diagnostics);
    }

    if !schema.is_empty() {
        for key in obj.keys() {
            if schema.attribute(key).is_none() {
                diagnostics.push(
                    Diagnostic::error(format!("Unknown attribute '{}'", key))
                        .with_detail("this resource does not declare the attribute")
                        .with_attribute(key.as_str()),
                );
            }
        }
    }

    diagnostics
}

/// [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, inputs: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, inputs);
    if diagnostics.iter().any(Diagnostic::is_error) {
        Err(diagnostics)
    } else {
        Ok(())
    }
}

/// Whether `inputs` passes [`validate`] without errors.
pub fn is_valid(schema: &Schema, inputs: &Value) -> bool {
    validate_result(schema, inputs).is_ok()
}

fn check_attribute(name: &str, attr: &Attribute, value: Option<&Value>, out: &mut Vec<Diagnostic>) {
    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                out.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_attribute(name),
                );
            }
        },
        Some(_) if attr.flags.is_output_only() => {
            out.push(
                Diagnostic::error(format!("Attribute '{}' is read-only", name))
                    .with_detail("the value is assigned by the platform and cannot be set")
                    .with_attribute(name),
            );
        },
        Some(v) => check_type(&attr.attr_type, v, name, out),
    }
}

fn check_type(expected: &AttributeType, value: &Value, path: &str, out: &mut Vec<Diagnostic>) {
    let matches = match expected {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
        AttributeType::Float64 => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Dynamic => true,
        AttributeType::List(element) => match value.as_array() {
            Some(items) => {
                check_elements(element, items, path, out);
                true
            },
            None => false,
        },
        AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                check_elements(element, items, path, out);
                if let Some(dup) = first_duplicate(items) {
                    out.push(
                        Diagnostic::error(format!("Duplicate element in set '{}'", path))
                            .with_detail(format!("{} appears more than once", dup))
                            .with_attribute(path),
                    );
                }
                true
            },
            None => false,
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    check_type(element, item, &join_path(path, key), out);
                }
                true
            },
            None => false,
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(entries) => {
                check_object_fields(fields, entries, path, out);
                true
            },
            None => false,
        },
    };

    if !matches {
        out.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!(
                    "expected {}, got {}",
                    expected.name(),
                    value_type_name(value)
                ))
                .with_attribute(path),
        );
    }
}

fn check_elements(element: &AttributeType, items: &[Value], path: &str, out: &mut Vec<Diagnostic>) {
    for (i, item) in items.iter().enumerate() {
        check_type(element, item, &format!("{}.{}", path, i), out);
    }
}

fn check_object_fields(
    fields: &std::collections::BTreeMap<String, AttributeType>,
    entries: &Map<String, Value>,
    path: &str,
    out: &mut Vec<Diagnostic>,
) {
    for (key, item) in entries {
        let item_path = join_path(path, key);
        match fields.get(key) {
            Some(_) if item.is_null() => {},
            Some(field_type) => check_type(field_type, item, &item_path, out),
            None => out.push(
                Diagnostic::error(format!("Unknown attribute '{}'", item_path))
                    .with_attribute(item_path),
            ),
        }
    }
}

fn first_duplicate(items: &[Value]) -> Option<&Value> {
    items
        .iter()
        .enumerate()
        .find(|&(i, item)| items[..i].contains(item))
        .map(|(_, item)| item)
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => n.as_i64().is_some(),
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags};
    use serde_json::json;

    fn redirect_schema() -> Schema {
        Schema::v0()
            .with_attribute("siteId", Attribute::required_string().replace_on_change())
            .with_attribute("sourcePath", Attribute::required_string())
            .with_attribute("destinationPath", Attribute::required_string())
            .with_attribute("statusCode", Attribute::optional_int64())
            .with_attribute("createdOn", Attribute::computed_string())
    }

    fn valid_redirect() -> Value {
        json!({
            "siteId": "site1",
            "sourcePath": "/old",
            "destinationPath": "/new",
            "statusCode": 301
        })
    }

    #[test]
    fn test_valid_inputs() {
        assert!(validate(&redirect_schema(), &valid_redirect()).is_empty());
        assert!(is_valid(&redirect_schema(), &valid_redirect()));
    }

    #[test]
    fn test_missing_required() {
        let mut inputs = valid_redirect();
        inputs.as_object_mut().unwrap().remove("sourcePath");
        let diagnostics = validate(&redirect_schema(), &inputs);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("sourcePath"));

        inputs["sourcePath"] = Value::Null;
        assert_eq!(validate(&redirect_schema(), &inputs).len(), 1);
    }

    #[test]
    fn test_optional_may_be_null_or_absent() {
        let mut inputs = valid_redirect();
        inputs["statusCode"] = Value::Null;
        assert!(is_valid(&redirect_schema(), &inputs));
        inputs.as_object_mut().unwrap().remove("statusCode");
        assert!(is_valid(&redirect_schema(), &inputs));
    }

    #[test]
    fn test_wrong_type() {
        let mut inputs = valid_redirect();
        inputs["statusCode"] = json!(301.5);
        let diagnostics = validate(&redirect_schema(), &inputs);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("expected int64, got number"));

        inputs["statusCode"] = json!(302.0);
        assert!(is_valid(&redirect_schema(), &inputs));
    }

    #[test]
    fn test_unknown_attribute_rejected() {
        let mut inputs = valid_redirect();
        inputs["sourcePth"] = json!("/typo");
        let diagnostics = validate(&redirect_schema(), &inputs);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Unknown attribute 'sourcePth'");
    }

    #[test]
    fn test_output_only_cannot_be_set() {
        let mut inputs = valid_redirect();
        inputs["createdOn"] = json!("2024-01-01T00:00:00Z");
        let diagnostics = validate(&redirect_schema(), &inputs);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("read-only"));
    }

    #[test]
    fn test_empty_schema_accepts_any_object() {
        let schema = Schema::v0();
        assert!(is_valid(&schema, &json!({"anything": [1, 2, 3]})));
        assert!(!is_valid(&schema, &json!("text")));
    }

    #[test]
    fn test_root_must_be_object() {
        let diagnostics = validate(&redirect_schema(), &json!(["not", "an", "object"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("got array"));
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_nested_paths() {
        let schema = Schema::v0()
            .with_attribute(
                "tags",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::optional()),
            )
            .with_attribute(
                "headers",
                Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::optional()),
            )
            .with_attribute(
                "seo",
                Attribute::new(
                    AttributeType::object([
                        ("title", AttributeType::String),
                        ("indexed", AttributeType::Bool),
                    ]),
                    AttributeFlags::optional(),
                ),
            );

        let diagnostics = validate(
            &schema,
            &json!({
                "tags": ["a", 1],
                "headers": {"x-one": "1", "x-two": 2},
                "seo": {"title": "Home", "indexed": "yes", "extra": true}
            }),
        );
        let mut paths: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.clone())
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec!["headers.x-two", "seo.extra", "seo.indexed", "tags.1"]
        );
    }

    #[test]
    fn test_set_rejects_duplicates() {
        let schema = Schema::v0().with_attribute(
            "domains",
            Attribute::new(AttributeType::set(AttributeType::String), AttributeFlags::optional()),
        );
        assert!(is_valid(&schema, &json!({"domains": ["a.com", "b.com"]})));
        let diagnostics = validate(&schema, &json!({"domains": ["a.com", "a.com"]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Duplicate"));
    }

    #[test]
    fn test_validate_result_collects_all() {
        let result = validate_result(
            &redirect_schema(),
            &json!({"siteId": 1, "sourcePath": true, "destinationPath": "/x"}),
        );
        assert_eq!(result.unwrap_err().len(), 2);
    }

    #[test]
    fn test_dynamic_accepts_anything() {
        let schema = Schema::v0().with_attribute(
            "fieldData",
            Attribute::new(AttributeType::Dynamic, AttributeFlags::optional()),
        );
        assert!(is_valid(&schema, &json!({"fieldData": {"name": "x", "n": [1]}})));
        assert!(is_valid(&schema, &json!({"fieldData": 3})));
    }
}
