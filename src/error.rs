//! Error types for plan configuration and retry execution.

use std::fmt;

/// Error raised at configuration time, before any attempt runs.
///
/// Every variant represents a misuse that can be detected synchronously
/// while a plan or delay combinator is being built. Nothing in this enum
/// ever surfaces from a running retry loop.
///
/// # Examples
///
/// ```rust
/// use resurge::{Condition, ConfigError, Delay, Runner};
///
/// let err = Runner::<std::io::Error>::new()
///     .upon(Condition::interruption(), vec![Delay::of_millis(10)])
///     .unwrap_err();
/// assert_eq!(err, ConfigError::InterruptionNotRetryable);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A retry rule was registered for the interruption signal.
    ///
    /// Interruption is reserved exclusively as a stop request and must
    /// never be retried.
    InterruptionNotRetryable,
    /// A delay multiplication factor was negative or non-finite.
    NegativeFactor(f64),
    /// A backoff multiplier was zero, negative, or non-finite.
    NonPositiveMultiplier(f64),
    /// A randomness amount fell outside `[0, 1]`.
    RandomnessOutOfRange(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterruptionNotRetryable => {
                write!(f, "interruption is a stop request and cannot be retried")
            }
            Self::NegativeFactor(v) => {
                write!(f, "delay factor must be finite and >= 0, got {}", v)
            }
            Self::NonPositiveMultiplier(v) => {
                write!(f, "backoff multiplier must be finite and > 0, got {}", v)
            }
            Self::RandomnessOutOfRange(v) => {
                write!(f, "randomness must be within [0, 1], got {}", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Signal that a retry invocation was stopped from outside.
///
/// Interruption is terminal by design: it is never consulted against the
/// plan, no rule can match it, and it always ends the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retry interrupted by stop request")
    }
}

impl std::error::Error for Interrupted {}

/// Terminal outcome of a failed retry invocation.
///
/// Carries the most recent genuine failure plus the errors of every prior
/// attempt, so diagnostics survive the retry loop without ever masking the
/// error that actually ended it.
///
/// # Examples
///
/// ```rust
/// use resurge::{Condition, Delay, Runner, RetryError};
///
/// let runner = Runner::new()
///     .upon(Condition::when(|e: &&str| e.starts_with("transient")), vec![Delay::of_millis(1)])
///     .unwrap();
///
/// let result: Result<(), _> = runner.retry_blockingly(|| Err("transient glitch"));
/// match result.unwrap_err() {
///     RetryError::Failed { error, history } => {
///         assert_eq!(error, "transient glitch");
///         assert_eq!(history.len(), 1); // the one retried attempt
///     }
///     RetryError::Interrupted(_) => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The invocation was cancelled; no further attempts were made.
    Interrupted(Interrupted),
    /// The last attempt's error, uncovered by the plan or past its last
    /// strategy, plus every previously recorded attempt error.
    Failed {
        /// The error from the final attempt.
        error: E,
        /// Errors from earlier attempts, oldest first.
        history: Vec<E>,
    },
}

impl<E> RetryError<E> {
    /// Total number of attempts this invocation made, if it failed.
    ///
    /// `None` for interruption, where the count is meaningless.
    pub fn attempts(&self) -> Option<usize> {
        match self {
            Self::Interrupted(_) => None,
            Self::Failed { history, .. } => Some(history.len() + 1),
        }
    }

    /// Extract the final error, discarding the history.
    pub fn into_error(self) -> Option<E> {
        match self {
            Self::Interrupted(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    /// True if the invocation ended by cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupted(i) => write!(f, "{}", i),
            Self::Failed { error, history } => {
                write!(
                    f,
                    "retry gave up after {} attempts: {}",
                    history.len() + 1,
                    error
                )
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Interrupted(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}
