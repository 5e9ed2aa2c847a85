//! Classification of transport outcomes.
//!
//! Every attempt the transport makes ends in an [`Outcome`]: an HTTP status,
//! a network failure with no status, or a cancellation. [`classify`] maps
//! each outcome to exactly one [`ErrorKind`], or to `None` for success.

use serde::{Deserialize, Serialize};

/// The kind of failure an attempt ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure or 5xx; worth retrying.
    Transient,
    /// 429; worth retrying, honoring the server's wait hint.
    RateLimited,
    /// 404; the resource is absent.
    NotFound,
    /// Any other client error; retrying cannot help.
    Permanent,
    /// The caller aborted.
    Cancelled,
}

impl ErrorKind {
    /// Whether an attempt that ended in this kind may be retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient | Self::RateLimited)
    }
}

/// Why an attempt produced no HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFailure {
    /// The request or the connection timed out.
    Timeout,
    /// Connecting failed (refused, DNS resolution, TLS handshake).
    Connect,
    /// The connection dropped mid-request or while reading the body.
    Interrupted,
    /// The request could not even be built (bad URL, bad header).
    InvalidRequest,
}

impl NetworkFailure {
    /// Derive the failure mode from a `reqwest` error.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            Self::InvalidRequest
        } else if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else {
            Self::Interrupted
        }
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response with this status arrived.
    Status(u16),
    /// No response arrived.
    Network(NetworkFailure),
    /// The cancellation signal fired during the attempt.
    Cancelled,
}

/// Classify an attempt outcome. Returns `None` for 2xx.
pub fn classify(outcome: Outcome) -> Option<ErrorKind> {
    match outcome {
        Outcome::Cancelled => Some(ErrorKind::Cancelled),
        Outcome::Status(status) => classify_status(status),
        Outcome::Network(NetworkFailure::InvalidRequest) => Some(ErrorKind::Permanent),
        Outcome::Network(_) => Some(ErrorKind::Transient),
    }
}

/// Classify an HTTP status code. Returns `None` for 2xx.
///
/// Statuses outside 2xx/4xx/5xx (informational, or a redirect that was not
/// followed) are unexpected from a JSON API and count as permanent.
pub fn classify_status(status: u16) -> Option<ErrorKind> {
    match status {
        200..=299 => None,
        404 => Some(ErrorKind::NotFound),
        429 => Some(ErrorKind::RateLimited),
        400..=499 => Some(ErrorKind::Permanent),
        500..=599 => Some(ErrorKind::Transient),
        _ => Some(ErrorKind::Permanent),
    }
}

/// Classify an outcome observed while the caller may have cancelled.
///
/// A cancellation observed mid-call wins over whatever status arrived.
pub fn classify_observed(outcome: Outcome, cancelled: bool) -> Option<ErrorKind> {
    if cancelled {
        Some(ErrorKind::Cancelled)
    } else {
        classify(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_not_an_error() {
        for status in [200, 201, 202, 204, 299] {
            assert_eq!(classify(Outcome::Status(status)), None);
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify_status(404), Some(ErrorKind::NotFound));
        assert_eq!(classify_status(429), Some(ErrorKind::RateLimited));
        assert_eq!(classify_status(400), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(401), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(403), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(409), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(500), Some(ErrorKind::Transient));
        assert_eq!(classify_status(502), Some(ErrorKind::Transient));
        assert_eq!(classify_status(503), Some(ErrorKind::Transient));
    }

    #[test]
    fn test_classification_is_total() {
        for status in 0..=u16::MAX {
            let kind = classify_status(status);
            if (200..300).contains(&status) {
                assert!(kind.is_none(), "status {status}");
            } else {
                assert!(kind.is_some(), "status {status}");
            }
        }
    }

    #[test]
    fn test_unexpected_statuses_are_permanent() {
        assert_eq!(classify_status(100), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(301), Some(ErrorKind::Permanent));
        assert_eq!(classify_status(600), Some(ErrorKind::Permanent));
    }

    #[test]
    fn test_network_failures() {
        assert_eq!(
            classify(Outcome::Network(NetworkFailure::Timeout)),
            Some(ErrorKind::Transient)
        );
        assert_eq!(
            classify(Outcome::Network(NetworkFailure::Connect)),
            Some(ErrorKind::Transient)
        );
        assert_eq!(
            classify(Outcome::Network(NetworkFailure::Interrupted)),
            Some(ErrorKind::Transient)
        );
        assert_eq!(
            classify(Outcome::Network(NetworkFailure::InvalidRequest)),
            Some(ErrorKind::Permanent)
        );
    }

    #[test]
    fn test_cancellation_wins() {
        assert_eq!(classify(Outcome::Cancelled), Some(ErrorKind::Cancelled));
        assert_eq!(
            classify_observed(Outcome::Status(200), true),
            Some(ErrorKind::Cancelled)
        );
        assert_eq!(
            classify_observed(Outcome::Status(503), true),
            Some(ErrorKind::Cancelled)
        );
        assert_eq!(classify_observed(Outcome::Status(200), false), None);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
        assert!(!ErrorKind::Permanent.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }
}
