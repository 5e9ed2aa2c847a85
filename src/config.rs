//! Provider configuration as received from the engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::credential::Credential;
use crate::error::ProviderError;
use crate::logging::REDACTED;
use crate::schema::{Attribute, Schema};
use crate::transport::{AuthenticatedTransport, TransportConfig};

/// Environment variable consulted when no token is configured.
pub const API_TOKEN_ENV: &str = "WEBFLOW_API_TOKEN";

/// The provider-level configuration block.
///
/// Every field is optional; unset fields keep the [`TransportConfig`]
/// defaults.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub allow_insecure_http: bool,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| REDACTED))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("allow_insecure_http", &self.allow_insecure_http)
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the engine's config bag. `null` means all defaults.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(value)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider configuration: {e}")))
    }

    /// Schema of the configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Webflow provider configuration")
            .with_attribute(
                "apiToken",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("API token; falls back to WEBFLOW_API_TOKEN"),
            )
            .with_attribute("baseUrl", Attribute::optional_string())
            .with_attribute("timeoutSeconds", Attribute::optional_int64())
            .with_attribute("maxRetries", Attribute::optional_int64())
            .with_attribute("allowInsecureHttp", Attribute::optional_bool())
    }

    /// The token from the process environment, if set.
    pub fn from_env_fallback() -> Option<String> {
        std::env::var(API_TOKEN_ENV).ok()
    }

    /// The configured token wins over `env_token`.
    pub fn resolve_credential(&self, env_token: Option<String>) -> Result<Credential, ProviderError> {
        match (&self.api_token, env_token) {
            (Some(token), _) => Credential::new(token.clone()),
            (None, Some(token)) => {
                debug!("using API token from environment");
                Credential::new(token)
            },
            (None, None) => Err(Credential::not_configured()),
        }
    }

    pub fn transport_config(&self) -> Result<TransportConfig, ProviderError> {
        let mut config = TransportConfig::default();
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.clone());
        }
        if let Some(seconds) = self.timeout_seconds {
            if seconds == 0 {
                return Err(ProviderError::Configuration(
                    "timeoutSeconds must be greater than zero".to_string(),
                ));
            }
            config = config.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(max_retries) = self.max_retries {
            config.policy = config.policy.with_max_retries(max_retries);
        }
        if self.allow_insecure_http {
            config = config.allow_insecure_http();
        }
        Ok(config)
    }

    /// Resolve the credential and build the shared transport.
    pub fn build_transport(&self, env_token: Option<String>) -> Result<AuthenticatedTransport, ProviderError> {
        let credential = self.resolve_credential(env_token)?;
        AuthenticatedTransport::new(credential, self.transport_config()?)
    }
}
