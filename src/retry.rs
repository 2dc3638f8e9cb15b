//! Explicit retry state machine for transient provider failures.
//!
//! The retry loop is expressed as data rather than control flow so the
//! bound and the backoff schedule can be tested without sleeping or
//! touching the network. The pipeline drives it:
//!
//! ```text
//! Attempting ──transient failure──▶ BackingOff ──delay elapsed──▶ Attempting
//!     │                                 │
//!     └──success / permanent failure    └──attempts exhausted──▶ Exhausted
//! ```
//!
//! Permanent failures never enter `BackingOff`; the caller stops driving
//! the machine the moment the provider error is classified as such.

use std::time::Duration;

/// Where a retryable operation currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// An attempt is in flight (or about to be issued). `attempt` is
    /// 0-based: the first try is attempt 0 and does not count as a retry.
    Attempting { attempt: u32 },
    /// The previous attempt failed transiently; wait `delay` before the
    /// next attempt.
    BackingOff { next_attempt: u32, delay: Duration },
    /// The retry budget is spent; the failure is terminal.
    Exhausted,
}

/// Bound and backoff schedule for one retryable operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay; doubles on each subsequent retry.
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            base_backoff: Duration::from_millis(base_backoff_ms),
        }
    }

    /// Initial state: first attempt, no backoff yet.
    pub fn start(&self) -> RetryState {
        RetryState::Attempting { attempt: 0 }
    }

    /// Advance the machine after a transient failure of the current attempt.
    ///
    /// Returns `BackingOff` while budget remains, `Exhausted` otherwise.
    pub fn after_transient_failure(&self, state: RetryState) -> RetryState {
        match state {
            RetryState::Attempting { attempt } if attempt < self.max_retries => {
                RetryState::BackingOff {
                    next_attempt: attempt + 1,
                    delay: self.backoff_for(attempt + 1),
                }
            }
            _ => RetryState::Exhausted,
        }
    }

    /// Advance the machine once the backoff delay has elapsed.
    pub fn after_backoff(&self, state: RetryState) -> RetryState {
        match state {
            RetryState::BackingOff { next_attempt, .. } => {
                RetryState::Attempting { attempt: next_attempt }
            }
            other => other,
        }
    }

    /// Backoff delay before the given (1-based) retry: `base * 2^(n-1)`.
    fn backoff_for(&self, retry: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}
