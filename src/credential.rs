//! API credentials.

use std::fmt;

use crate::error::ProviderError;
use crate::logging::redact_token;

/// The API token is missing from both configuration and environment.
pub const ERR_CODE_AUTH_NOT_CONFIGURED: &str = "WEBFLOW_AUTH_001";
/// An empty API token was provided.
pub const ERR_CODE_AUTH_EMPTY: &str = "WEBFLOW_AUTH_002";
/// The API token is too short to be real.
pub const ERR_CODE_AUTH_INVALID: &str = "WEBFLOW_AUTH_003";

const MIN_TOKEN_LEN: usize = 10;

/// A bearer token for the platform API.
///
/// `Debug` and `Display` never show the token; use [`Credential::redacted`]
/// wherever the credential needs to appear in diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Validate and wrap a token. Surrounding whitespace is dropped.
    pub fn new(token: impl Into<String>) -> Result<Self, ProviderError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "[{ERR_CODE_AUTH_EMPTY}] API token cannot be empty"
            )));
        }
        if token.chars().count() < MIN_TOKEN_LEN {
            return Err(ProviderError::Configuration(format!(
                "[{ERR_CODE_AUTH_INVALID}] API token appears invalid (too short); \
                 platform tokens are typically 40+ characters"
            )));
        }
        Ok(Self { token })
    }

    /// The error returned when no token was found anywhere.
    pub fn not_configured() -> ProviderError {
        ProviderError::Configuration(format!(
            "[{ERR_CODE_AUTH_NOT_CONFIGURED}] API token not configured; set `apiToken` in \
             the provider configuration or the WEBFLOW_API_TOKEN environment variable"
        ))
    }

    /// The fixed placeholder written to diagnostics instead of the token.
    pub fn redacted(&self) -> &'static str {
        redact_token(&self.token)
    }

    pub(crate) fn expose(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "wf_test_0123456789abcdef0123456789abcdef";

    #[test]
    fn test_valid_token() {
        let credential = Credential::new(TOKEN).unwrap();
        assert_eq!(credential.expose(), TOKEN);
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = Credential::new("").unwrap_err();
        assert!(err.to_string().contains(ERR_CODE_AUTH_EMPTY));
    }

    #[test]
    fn test_whitespace_token_rejected() {
        let err = Credential::new("   \t\n ").unwrap_err();
        assert!(err.to_string().contains(ERR_CODE_AUTH_EMPTY));

        let err = Credential::new("  abc123        ").unwrap_err();
        assert!(err.to_string().contains(ERR_CODE_AUTH_INVALID));

        let credential = Credential::new(format!("  {TOKEN}\n")).unwrap();
        assert_eq!(credential.expose(), TOKEN);
    }

    #[test]
    fn test_short_token_rejected() {
        let err = Credential::new("abc123").unwrap_err();
        assert!(err.to_string().contains(ERR_CODE_AUTH_INVALID));
    }

    #[test]
    fn test_not_configured_error() {
        let err = Credential::not_configured();
        assert!(err.to_string().contains(ERR_CODE_AUTH_NOT_CONFIGURED));
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_token_never_formatted() {
        let credential = Credential::new(TOKEN).unwrap();
        let debug = format!("{:?}", credential);
        let display = format!("{}", credential);
        assert!(!debug.contains(TOKEN));
        assert!(!display.contains(TOKEN));
        assert_eq!(display, "[REDACTED]");
        assert_eq!(debug, "Credential(\"[REDACTED]\")");
    }
}
