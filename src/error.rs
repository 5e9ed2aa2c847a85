//! Error types for the Webflow provider SDK.
//!
//! [`ProviderError`] is the taxonomy every layer speaks. The lifecycle
//! controller wraps it in an [`OperationError`] that also names the
//! operation, the resource and the number of API attempts, so the message a
//! human finally reads is always actionable.

use std::time::Duration;

use thiserror::Error;

use crate::classify::ErrorKind;
use crate::identifier::IdError;
use crate::types::Operation;

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The desired inputs are structurally malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored resource identifier could not be decoded.
    #[error("Invalid resource ID: {0}")]
    InvalidId(#[from] IdError),

    /// The API rejected the credential (401) or its permissions (403).
    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth {
        /// The HTTP status returned by the API.
        status: u16,
        /// The (truncated) response body.
        message: String,
    },

    /// The remote resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The API kept rate limiting the request until retries ran out.
    #[error("Rate limited: gave up after {attempts} attempt(s) over {elapsed:?}: {message}")]
    RateLimited {
        /// Number of requests sent.
        attempts: u32,
        /// Total time spent on the call, including backoff waits.
        elapsed: Duration,
        /// The last response body or failure description.
        message: String,
    },

    /// Network failures or 5xx responses persisted until retries ran out.
    #[error("Transient failure: gave up after {attempts} attempt(s) over {elapsed:?}: {message}")]
    Transient {
        /// Number of requests sent.
        attempts: u32,
        /// Total time spent on the call, including backoff waits.
        elapsed: Duration,
        /// The last response body or failure description.
        message: String,
    },

    /// The API rejected the request and retrying cannot help.
    #[error("Request rejected{}: {message}", status_suffix(.status))]
    Permanent {
        /// The HTTP status, if a response was received.
        status: Option<u16>,
        /// The (truncated) response body or failure description.
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An in-place update was requested for a change set that needs replacement.
    #[error("Replacement required: {0}")]
    ReplacementRequired(String),

    /// The API answered successfully but with a body the adapter cannot use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider configuration or credential problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No adapter is registered for the requested resource type.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl ProviderError {
    /// The classifier kind behind this error, for errors that came from the API.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Auth { .. } | Self::Permanent { .. } => Some(ErrorKind::Permanent),
            Self::NotFound(_) => Some(ErrorKind::NotFound),
            Self::RateLimited { .. } => Some(ErrorKind::RateLimited),
            Self::Transient { .. } => Some(ErrorKind::Transient),
            Self::Cancelled => Some(ErrorKind::Cancelled),
            _ => None,
        }
    }

    /// Whether this error means the remote resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error means the caller aborted.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// What a human should check or do to recover.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Validation(_) => {
                "Fix the named input field in the resource configuration and run again."
            },
            Self::InvalidId(_) => {
                "The stored resource ID is malformed; re-import the resource to rebuild its state."
            },
            Self::Auth { status: 403, .. } => {
                "Ensure the API token has the scopes this resource needs and that the site \
                 belongs to the workspace the token was issued for."
            },
            Self::Auth { .. } => {
                "The API token is invalid or expired; generate a new token in the site's \
                 integration settings and update the provider configuration."
            },
            Self::NotFound(_) => {
                "Verify the identifier is correct; the resource may have been deleted outside \
                 of this tool."
            },
            Self::RateLimited { .. } => {
                "The API rate limit is still exceeded; wait a few minutes or reduce the number \
                 of concurrent operations, then retry."
            },
            Self::Transient { .. } => {
                "Check network connectivity and the platform status page; retry once the \
                 outage is resolved."
            },
            Self::Permanent { .. } => {
                "Check the resource configuration against the API's requirements; retrying \
                 the same request will fail again."
            },
            Self::Cancelled => "The operation was cancelled before completing; no state was committed.",
            Self::ReplacementRequired(_) => {
                "An immutable field changed; delete and recreate the resource instead of updating it."
            },
            Self::InvalidResponse(_) => {
                "The API returned an unexpected payload; check for API version changes."
            },
            Self::Configuration(message) if message.contains("WEBFLOW_AUTH_") => {
                "Set a valid API token in the provider configuration or the WEBFLOW_API_TOKEN \
                 environment variable."
            },
            Self::Configuration(_) => {
                "Check the provider configuration values (base URL, timeout, retries) and \
                 run again."
            },
            Self::UnknownResource(_) => "Check the resource type name against the provider schema.",
            Self::Serialization(_) => "The payload could not be (de)serialized; check the input types.",
        }
    }
}

/// A [`ProviderError`] annotated with the lifecycle operation that produced it.
#[derive(Debug, Error)]
#[error(
    "{operation} {resource_type}{} failed {}: {source}. Hint: {}",
    id_suffix(.resource_id),
    attempts_phrase(.attempts),
    .source.hint()
)]
pub struct OperationError {
    /// The lifecycle operation that failed.
    pub operation: Operation,
    /// The resource type the operation ran against.
    pub resource_type: String,
    /// The resource identifier, when one was known.
    pub resource_id: Option<String>,
    /// Number of API requests sent (0 when the failure happened before any I/O).
    pub attempts: u32,
    /// The underlying error.
    #[source]
    pub source: ProviderError,
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_ref().map(|id| format!(" '{id}'")).unwrap_or_default()
}

fn attempts_phrase(attempts: &u32) -> String {
    match attempts {
        0 => "before any API request".to_string(),
        n => format!("after {n} attempt(s)"),
    }
}

impl OperationError {
    /// Wrap an error with operation context.
    pub fn new(
        operation: Operation,
        resource_type: impl Into<String>,
        resource_id: Option<String>,
        attempts: u32,
        source: ProviderError,
    ) -> Self {
        Self {
            operation,
            resource_type: resource_type.into(),
            resource_id,
            attempts,
            source,
        }
    }

    /// The underlying error.
    pub fn error(&self) -> &ProviderError {
        &self.source
    }

    /// The classifier kind behind the underlying error.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.source.kind()
    }

    /// What a human should check or do to recover.
    pub fn hint(&self) -> &'static str {
        self.source.hint()
    }
}
