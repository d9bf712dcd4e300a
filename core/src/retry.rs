//! Retry configuration and strategies.

use std::time::Duration;

use rand::Rng;

use crate::Error;

/// Retry policy applied by [`crate::Transport`].
///
/// `max_attempts` counts every send, the first one included, so a policy with
/// `max_attempts = 3` sends a request at most three times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, first send included. Never below 1.
    pub max_attempts: u32,
    /// Backoff strategy between attempts.
    pub backoff: BackoffStrategy,
    /// Randomize each delay to avoid retry storms.
    pub jitter: bool,
    /// Timeout of a single HTTP attempt.
    pub attempt_timeout: Duration,
    /// Deadline of a logical operation, all attempts and delays included.
    pub operation_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            jitter: true,
            attempt_timeout: Duration::from_secs(30),
            operation_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with exponential backoff.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Create a policy with no delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// Create a policy that sends every request exactly once.
    pub fn no_retry() -> Self {
        Self::immediate(1)
    }

    /// Disable jitter, making delays deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Set the timeout of a single attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the deadline of a whole operation; `None` removes it.
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Delay before the attempt following `attempt` (0-indexed).
    ///
    /// With jitter on, the delay is drawn uniformly from `[base / 2, base]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.backoff.delay_for_attempt(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }

        let half = base / 2;
        let spread = (base - half).as_millis() as u64;
        half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
    }

    /// Decide whether a failed attempt may be sent again.
    ///
    /// `attempt` is the 1-indexed number of the attempt that just failed and
    /// `idempotent` tells whether resending could apply the request twice.
    pub fn should_retry(&self, attempt: u32, idempotent: bool, err: &Error) -> bool {
        attempt < self.max_attempts && Self::is_retryable(idempotent, err)
    }

    /// Check whether `err` is worth another attempt, ignoring the attempt budget.
    pub fn is_retryable(idempotent: bool, err: &Error) -> bool {
        // A request that never reached the server can always be resent.
        if err.is_not_sent() {
            return true;
        }

        idempotent && err.is_retryable()
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Exponential backoff: delay grows by `multiplier` each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let factor = multiplier.powi(attempt.min(63) as i32);
                let millis = initial.as_millis() as f64 * factor;
                if !millis.is_finite() || millis >= max.as_millis() as f64 {
                    *max
                } else {
                    Duration::from_millis(millis as u64)
                }
            }
        }
    }
}
