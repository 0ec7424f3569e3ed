//! Retry-on-returned-value, adapted onto the error-driven loop.
//!
//! The drivers only know how to retry failures, so a rejected return value
//! travels through them disguised as one: the internal [`Trip`] tag wraps
//! either a carried value or a genuine error, and a dedicated rule matches
//! the value side. One loop serves both triggers; nothing is duplicated.
//! `Trip` never escapes - results are unwrapped and histories stripped
//! before anything reaches the caller.

use std::fmt;
use std::sync::Arc;

use crate::delay::IntoDelaySequence;
use crate::error::{ConfigError, RetryError};
use crate::plan::Plan;
use crate::rule::{Condition, Rule};
use crate::runner::Runner;

/// Internal marker routing a rejected return value through the error
/// channel. Never visible outside this module.
pub(crate) enum Trip<T, E> {
    Value(T),
    Error(E),
}

// Delegates to the payload so delay hooks log the carried value or error,
// never the wrapper.
impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Trip<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Error(e) => e.fmt(f),
        }
    }
}

/// Lift a condition over `E` to one over `Trip<T, E>` matching only the
/// error side.
fn lift<T, E>(condition: Condition<E>) -> Condition<Trip<T, E>>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    Condition::when(move |trip: &Trip<T, E>| match trip {
        Trip::Error(error) => condition.matches(error),
        Trip::Value(_) => false,
    })
}

/// A runner that retries on undesirable *return values* as well as errors.
///
/// Built by [`Runner::if_returns`] or [`Runner::upon_return`]. After each
/// call the result is tested against the predicate; a match triggers the
/// configured strategies exactly like a covered error would. One asymmetry
/// is deliberate: exhausting value-triggered retries yields the last
/// observed value as a normal result, never an error.
///
/// # Examples
///
/// ```rust
/// use resurge::{Delay, Runner};
///
/// let runner = Runner::<std::io::Error>::new()
///     .upon_return(503u16, vec![Delay::of_millis(1), Delay::of_millis(1)])
///     .unwrap();
///
/// let mut attempts = 0;
/// let result = runner.retry_blockingly(|| {
///     attempts += 1;
///     Ok(503u16) // always the bad value
/// });
///
/// // Both retries consumed, then the value comes back as a plain result.
/// assert_eq!(result.unwrap(), 503);
/// assert_eq!(attempts, 3);
/// ```
pub struct ReturnRunner<T, E> {
    runner: Runner<Trip<T, E>>,
    should_retry: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T, E> ReturnRunner<T, E>
where
    T: fmt::Debug + Send + Sync + 'static,
    E: fmt::Debug + Send + Sync + 'static,
{
    pub(crate) fn adapt(
        outer: Runner<E>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        strategies: impl IntoDelaySequence,
    ) -> Result<Self, ConfigError> {
        let mut rules: Vec<Rule<Trip<T, E>>> = outer
            .plan()
            .rules()
            .iter()
            .map(|rule| {
                Rule::at_cursor(
                    lift(rule.condition().clone()),
                    Arc::clone(rule.strategies()),
                    rule.cursor(),
                )
            })
            .collect();
        rules.push(Rule::new(
            Condition::when(|trip: &Trip<T, E>| matches!(trip, Trip::Value(_))),
            strategies.into_sequence(),
        ));

        let runner = Runner::with_plan(Plan::from_rules(rules))
            .with_cancel_token(outer.cancel_token().clone());
        Ok(Self {
            runner,
            should_retry: Arc::new(predicate),
        })
    }

    /// A new adapter whose plan additionally covers `condition` with the
    /// given strategies, like [`Runner::upon`].
    pub fn upon(
        self,
        condition: Condition<E>,
        strategies: impl IntoDelaySequence,
    ) -> Result<Self, ConfigError> {
        // The lifted closure would hide the sentinel, so reject it here.
        if condition.is_interruption() {
            return Err(ConfigError::InterruptionNotRetryable);
        }
        Ok(Self {
            runner: self.runner.upon(lift(condition), strategies)?,
            should_retry: self.should_retry,
        })
    }

    /// Invoke `supplier` until it returns an acceptable value, the plan
    /// refuses, or the stop signal trips.
    ///
    /// Values matching the retry predicate are treated as failures and
    /// consulted against the plan; once their strategies are exhausted the
    /// last observed value is returned as a normal `Ok`. Genuine errors
    /// behave exactly as in [`Runner::retry_blockingly`], with the marker
    /// stripped from the attempt history.
    pub fn retry_blockingly<F>(&self, mut supplier: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let should_retry = Arc::clone(&self.should_retry);
        let outcome = self.runner.retry_blockingly(move || match supplier() {
            Ok(value) if should_retry(&value) => Err(Trip::Value(value)),
            Ok(value) => Ok(value),
            Err(error) => Err(Trip::Error(error)),
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(RetryError::Interrupted(signal)) => Err(RetryError::Interrupted(signal)),
            Err(RetryError::Failed { error, history }) => {
                let history = history
                    .into_iter()
                    .filter_map(|trip| match trip {
                        Trip::Error(error) => Some(error),
                        Trip::Value(_) => None,
                    })
                    .collect();
                match error {
                    // Exhausted value retries end with the value itself.
                    Trip::Value(value) => Ok(value),
                    Trip::Error(error) => Err(RetryError::Failed { error, history }),
                }
            }
        }
    }
}

impl<T, E> fmt::Debug for ReturnRunner<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnRunner")
            .field("plan", self.runner.plan())
            .finish_non_exhaustive()
    }
}
