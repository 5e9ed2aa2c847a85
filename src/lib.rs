//! Webflow Provider SDK
//!
//! A resource reconciliation engine for infrastructure-as-code providers
//! that manage Webflow sites and their sub-resources. Each resource kind
//! supplies a small [`ResourceAdapter`]; the engine supplies everything a
//! kind would otherwise reimplement.
//!
//! # Overview
//!
//! - **Lifecycle**: [`LifecycleController`] implements check, diff, create,
//!   read, update, delete, import and apply once for every adapter
//! - **Transport**: [`AuthenticatedTransport`] sends bearer-authenticated
//!   requests and retries rate limits and transient failures with bounded
//!   exponential backoff, honoring `Retry-After`
//! - **Classification**: every response or network failure maps to one
//!   [`ErrorKind`] that decides retry versus fail
//! - **Identifiers**: composite IDs such as `{siteId}/redirects/{redirectId}`
//!   round-trip through [`ResourceId`]
//! - **Drift**: [`diff`] compares desired inputs with observed outputs under
//!   per-field [`FieldPolicy`] rules
//! - **Errors**: [`OperationError`] names the operation, the resource, the
//!   attempt count and a recovery hint
//! - **Functions**: read-only lookups such as token introspection run
//!   through [`ProviderFunction`] on the same transport
//! - **Logging**: structured `tracing` spans per operation, with credentials
//!   redacted
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use webflow_provider_sdk::{
//!     CancelSignal, IdFormat, LifecycleController, ProviderConfig, RestResource,
//!     schema::{Attribute, Schema},
//! };
//! use reqwest::Method;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     webflow_provider_sdk::init_logging();
//!
//!     let transport = ProviderConfig::default()
//!         .build_transport(ProviderConfig::from_env_fallback())?;
//!
//!     let redirects = RestResource::new(
//!         "webflow:index:Redirect",
//!         IdFormat::collection("redirects"),
//!         "/v2/sites/{scope}/redirects/{id}",
//!     )
//!     .with_scope_field("siteId")
//!     .with_create(Method::POST, "/v2/sites/{scope}/redirects")
//!     .with_list_read("/v2/sites/{scope}/redirects", "redirects")
//!     .with_schema(
//!         Schema::v0()
//!             .with_attribute("siteId", Attribute::required_string().replace_on_change())
//!             .with_attribute("fromUrl", Attribute::required_string())
//!             .with_attribute("toUrl", Attribute::required_string())
//!             .with_attribute("statusCode", Attribute::required_int64()),
//!     );
//!
//!     let controller = LifecycleController::new(redirects, Arc::new(transport));
//!     let state = controller
//!         .create(
//!             &json!({"siteId": "580e63e98c9a982ac9b8b741", "fromUrl": "/old", "toUrl": "/new", "statusCode": 301}),
//!             &CancelSignal::never(),
//!         )
//!         .await?;
//!     println!("created {}", state.id);
//!     Ok(())
//! }
//! ```
//!
//! # Cancellation
//!
//! Every network-touching operation takes a [`CancelSignal`]. Cancelling the
//! matching [`CancelHandle`] aborts in-flight requests and backoff waits;
//! the operation returns [`ProviderError::Cancelled`] and commits no state.

#![warn(clippy::all)]

pub mod backoff;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod credential;
pub mod diff;
pub mod error;
pub mod function;
pub mod identifier;
pub mod lifecycle;
pub mod logging;
pub mod provider;
pub mod rest;
pub mod schema;
pub mod testing;
pub mod transport;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use backoff::{BackoffPolicy, RetryContext};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use classify::{classify, classify_status, ErrorKind, Outcome};
pub use config::ProviderConfig;
pub use credential::Credential;
pub use diff::{diff, ChangeKind, ChangeSet, FieldChange, FieldPolicies, FieldPolicy};
pub use error::{OperationError, ProviderError};
pub use function::ProviderFunction;
pub use identifier::{IdError, IdFormat, ResourceId};
pub use lifecycle::{LifecycleController, ResourceAdapter};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ManagedResource, Provider};
pub use rest::RestResource;
pub use schema::ProviderSchema;
pub use transport::{ApiResponse, AuthenticatedTransport, RequestSpec, TransportConfig};
pub use types::{
    decode_inputs, encode_outputs, ApplyOptions, ApplyOutcome, Operation, Phase, Plan, ReadOutcome,
    ResourceState,
};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use reqwest;
pub use serde_json;
pub use tracing;
