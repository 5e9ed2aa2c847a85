//! Logging and redaction utilities.
//!
//! Logs go through `tracing` and are written to **stderr**, keeping stdout
//! free for the orchestrating engine. The redaction helpers make sure
//! credentials and oversized payloads never land in a log line verbatim.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `webflow_provider_sdk=debug`)
//!
//! ```bash
//! # Show every retry and request the transport makes
//! RUST_LOG=webflow_provider_sdk=debug ./my-provider
//! ```

use serde_json::Value;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::schema::Schema;

/// Placeholder written instead of any secret value.
pub const REDACTED: &str = "[REDACTED]";

/// Default cap for response bodies written to logs and error messages.
pub const MAX_LOGGED_BODY: usize = 512;

fn stderr_subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Initialize the default logging subscriber at `info` level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    stderr_subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    stderr_subscriber("info").try_init().is_ok()
}

/// Redact a token for logging. Never reveals any character of the input.
pub fn redact_token(token: &str) -> &'static str {
    if token.is_empty() {
        "<empty>"
    } else {
        REDACTED
    }
}

/// Redact a possibly sensitive value.
///
/// Long values (likely opaque IDs or keys) keep their first and last four
/// characters so they can be told apart; anything shorter is fully hidden.
pub fn redact_sensitive(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => "<empty>".to_string(),
        n if n > 40 => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}...{tail}")
        },
        _ => REDACTED.to_string(),
    }
}

/// Truncate a long string, noting how long it originally was.
pub fn truncate_for_logging(value: &str, max_chars: usize) -> String {
    let total = value.chars().count();
    if total <= max_chars {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_chars).collect();
    format!("{kept}... (truncated, {total} total chars)")
}

/// Render a field for logging, hiding values whose name suggests a secret.
pub fn safe_field(field_name: &str, value: &serde_json::Value) -> String {
    let name = field_name.to_ascii_lowercase();
    let sensitive = ["token", "password", "secret", "key", "authorization"]
        .iter()
        .any(|marker| name.contains(marker));
    let rendered = match value {
        serde_json::Value::Null => return "<nil>".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if sensitive {
        redact_token(&rendered).to_string()
    } else {
        rendered
    }
}

/// Render an input object for a log line.
///
/// Attributes the schema marks sensitive go through [`redact_sensitive`];
/// every other field goes through [`safe_field`]. Values are truncated.
pub fn loggable_fields(value: &Value, schema: &Schema) -> String {
    let Some(fields) = value.as_object() else {
        return truncate_for_logging(&value.to_string(), MAX_LOGGED_BODY);
    };
    let rendered: Vec<String> = fields
        .iter()
        .map(|(name, value)| {
            let sensitive = schema.attribute(name).is_some_and(|attr| attr.flags.sensitive);
            let shown = match value {
                Value::Null => "<nil>".to_string(),
                Value::String(s) if sensitive => redact_sensitive(s),
                other if sensitive => redact_sensitive(&other.to_string()),
                other => safe_field(name, other),
            };
            format!("{}={}", name, truncate_for_logging(&shown, 64))
        })
        .collect();
    format!("{{{}}}", rendered.join(", "))
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so these tests
    // exercise the filter parsing and the redaction helpers only.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("webflow_provider_sdk=debug").is_ok());
        assert!(EnvFilter::try_new("warn,webflow_provider_sdk::transport=trace").is_ok());
    }

    #[test]
    fn test_redact_token_is_fixed_length() {
        assert_eq!(redact_token(""), "<empty>");
        assert_eq!(redact_token("abc"), REDACTED);
        assert_eq!(redact_token(&"x".repeat(200)), REDACTED);
    }

    #[test]
    fn test_redact_sensitive() {
        assert_eq!(redact_sensitive(""), "<empty>");
        assert_eq!(redact_sensitive("short-secret"), REDACTED);
        let long = format!("abcd{}wxyz", "0".repeat(40));
        assert_eq!(redact_sensitive(&long), "abcd...wxyz");
    }

    #[test]
    fn test_truncate_for_logging() {
        assert_eq!(truncate_for_logging("hello", 10), "hello");
        let truncated = truncate_for_logging(&"a".repeat(20), 5);
        assert_eq!(truncated, "aaaaa... (truncated, 20 total chars)");
    }

    #[test]
    fn test_safe_field() {
        assert_eq!(safe_field("apiToken", &json!("secret-value")), REDACTED);
        assert_eq!(safe_field("Authorization", &json!("Bearer x")), REDACTED);
        assert_eq!(safe_field("displayName", &json!("My Site")), "My Site");
        assert_eq!(safe_field("statusCode", &json!(301)), "301");
        assert_eq!(safe_field("anything", &json!(null)), "<nil>");
    }

    #[test]
    fn test_loggable_fields_honors_schema_flags() {
        use crate::schema::Attribute;

        let schema = Schema::v0()
            .with_attribute("displayName", Attribute::required_string())
            .with_attribute("secretHeader", Attribute::optional_string().sensitive());
        let rendered = loggable_fields(
            &json!({"displayName": "Docs", "secretHeader": "hunter2", "apiKey": "k-123"}),
            &schema,
        );
        assert_eq!(
            rendered,
            "{apiKey=[REDACTED], displayName=Docs, secretHeader=[REDACTED]}"
        );
        assert!(!rendered.contains("hunter2"));
        assert_eq!(loggable_fields(&json!(null), &schema), "null");
    }
}
