//! The retry drivers.
//!
//! A [`Runner`] pairs an immutable [`Plan`] with a stop signal and drives the
//! attempt loop: blocking ([`retry_blockingly`](Runner::retry_blockingly),
//! sleeping on the caller's thread) or non-blocking (`retry_async`, behind
//! the `async` feature, with waits as pending timers on a caller-supplied
//! runtime). Retry-on-returned-value is adapted onto the same loop by
//! [`ReturnRunner`].

mod blocking;
#[cfg(feature = "async")]
mod nonblocking;
mod returns;

#[cfg(feature = "async")]
pub use nonblocking::RetryHandle;
pub use returns::ReturnRunner;

use std::fmt;

use crate::cancel::CancelToken;
use crate::delay::IntoDelaySequence;
use crate::error::ConfigError;
use crate::plan::Plan;
use crate::rule::Condition;

/// A configured retry driver over errors of type `E`.
///
/// Built fluently: each [`upon`](Runner::upon) call returns a new runner with
/// one more rule devised into the plan. Runners are immutable values; the
/// same runner can drive any number of concurrent invocations.
///
/// # Examples
///
/// ```rust
/// use resurge::{Condition, Delay, Runner};
///
/// let mut attempts = 0;
/// let result = Runner::new()
///     .upon(
///         Condition::when(|e: &&str| *e == "flaky"),
///         vec![Delay::of_millis(1), Delay::of_millis(1)],
///     )
///     .unwrap()
///     .retry_blockingly(|| {
///         attempts += 1;
///         if attempts < 3 { Err("flaky") } else { Ok("done") }
///     });
///
/// assert_eq!(result.unwrap(), "done");
/// assert_eq!(attempts, 3);
/// ```
pub struct Runner<E> {
    plan: Plan<E>,
    cancel: CancelToken,
}

impl<E> Clone for Runner<E> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E> fmt::Debug for Runner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("plan", &self.plan)
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl<E> Runner<E> {
    /// A runner with an empty plan: every error propagates immediately.
    pub fn new() -> Self {
        Self {
            plan: Plan::new(),
            cancel: CancelToken::new(),
        }
    }

    /// A runner driving an existing plan.
    pub fn with_plan(plan: Plan<E>) -> Self {
        Self {
            plan,
            cancel: CancelToken::new(),
        }
    }

    /// A new runner whose plan additionally covers `condition` with the
    /// given ordered strategies.
    ///
    /// Fails synchronously, at configuration time, when `condition` is the
    /// reserved interruption sentinel.
    pub fn upon(
        self,
        condition: Condition<E>,
        strategies: impl IntoDelaySequence,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            plan: self.plan.devise(condition, strategies)?,
            cancel: self.cancel,
        })
    }

    /// Install the stop signal consulted by the blocking driver.
    ///
    /// Cancelling the token ends the invocation at the next failure or
    /// mid-sleep, whichever comes first.
    pub fn with_cancel_token(self, token: CancelToken) -> Self {
        Self {
            plan: self.plan,
            cancel: token,
        }
    }

    /// The plan this runner drives.
    pub fn plan(&self) -> &Plan<E> {
        &self.plan
    }

    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

impl<E> Runner<E>
where
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Adapt this runner to retry on returned values matched by `predicate`.
    ///
    /// See [`ReturnRunner`]. The value type `T` is fixed here; existing
    /// error rules carry over unchanged.
    pub fn if_returns<T>(
        self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
        strategies: impl IntoDelaySequence,
    ) -> Result<ReturnRunner<T, E>, ConfigError>
    where
        T: fmt::Debug + Send + Sync + 'static,
    {
        ReturnRunner::adapt(self, predicate, strategies)
    }

    /// Adapt this runner to retry whenever the operation returns `value`.
    ///
    /// Shorthand for [`if_returns`](Runner::if_returns) with an equality
    /// predicate.
    pub fn upon_return<T>(
        self,
        value: T,
        strategies: impl IntoDelaySequence,
    ) -> Result<ReturnRunner<T, E>, ConfigError>
    where
        T: fmt::Debug + PartialEq + Send + Sync + 'static,
    {
        self.if_returns(move |v| *v == value, strategies)
    }
}

impl<E> Default for Runner<E> {
    fn default() -> Self {
        Self::new()
    }
}
