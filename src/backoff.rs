//! Retry policy and per-call retry bookkeeping.
//!
//! [`BackoffPolicy`] decides whether a failed attempt is retried and how long
//! to wait first. [`RetryContext`] tracks one logical call: how many attempts
//! were made, how long was spent waiting, and whether the caller cancelled.

use std::time::{Duration, Instant};

use crate::cancel::CancelSignal;
use crate::classify::ErrorKind;
use crate::error::ProviderError;

/// Retries allowed beyond the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wait before the first retry; doubles on every further retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap on the computed exponential wait.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Cap on a server-provided `Retry-After` hint.
pub const DEFAULT_MAX_HINT: Duration = Duration::from_secs(60);

/// Exponential backoff honoring server rate-limit hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries allowed beyond the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub base_delay: Duration,
    /// Cap on the computed exponential wait.
    pub max_delay: Duration,
    /// Cap on a server-provided wait hint.
    pub max_hint: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_hint: DEFAULT_MAX_HINT,
        }
    }
}

/// Whether to retry, and how long to wait first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Retry the request.
    pub should_retry: bool,
    /// How long to wait before the retry (zero when not retrying).
    pub wait: Duration,
}

impl RetryDecision {
    /// Give up.
    pub fn stop() -> Self {
        Self {
            should_retry: false,
            wait: Duration::ZERO,
        }
    }

    /// Retry after waiting `wait`.
    pub fn retry_after(wait: Duration) -> Self {
        Self {
            should_retry: true,
            wait,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries beyond the first attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the wait before the first retry.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the cap on the exponential wait.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the cap on server-provided wait hints.
    pub fn with_max_hint(mut self, hint: Duration) -> Self {
        self.max_hint = hint;
        self
    }

    /// Total attempts a single call may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `base_delay * 2^attempt`, capped at `max_delay`.
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Decide what to do after the zero-based `attempt` failed with `kind`.
    ///
    /// A rate-limit hint from the server replaces the exponential value,
    /// clamped to `max_hint`.
    pub fn next_delay(
        &self,
        attempt: u32,
        kind: ErrorKind,
        server_hint: Option<Duration>,
    ) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_retries {
            return RetryDecision::stop();
        }
        let wait = match (kind, server_hint) {
            (ErrorKind::RateLimited, Some(hint)) => hint.min(self.max_hint),
            _ => self.exponential_delay(attempt),
        };
        RetryDecision::retry_after(wait)
    }

    /// Sleep for `delay`, returning early with [`ProviderError::Cancelled`]
    /// if `cancel` fires first.
    pub async fn wait(&self, delay: Duration, cancel: &CancelSignal) -> Result<(), ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// Zero, negative, and HTTP-date forms yield `None`, leaving the wait to the
/// exponential schedule.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

/// Bookkeeping for one logical call, including all of its retries.
#[derive(Debug, Clone)]
pub struct RetryContext {
    attempts: u32,
    waited: Duration,
    started: Instant,
    max_attempts: u32,
    cancel: CancelSignal,
}

impl RetryContext {
    /// A context allowing at most `max_attempts` attempts.
    pub fn new(max_attempts: u32, cancel: CancelSignal) -> Self {
        Self {
            attempts: 0,
            waited: Duration::ZERO,
            started: Instant::now(),
            max_attempts,
            cancel,
        }
    }

    /// A context sized for `policy`.
    pub fn for_policy(policy: &BackoffPolicy, cancel: CancelSignal) -> Self {
        Self::new(policy.max_attempts(), cancel)
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The attempt cap.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Total time spent in backoff waits.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Wall-clock time since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The caller's cancellation signal.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Whether the caller has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Count a new attempt, returning its zero-based index.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        let index = self.attempts;
        self.attempts += 1;
        index
    }

    pub(crate) fn record_wait(&mut self, wait: Duration) {
        self.waited += wait;
    }
}
