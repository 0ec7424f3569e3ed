//! Immutable wait specifications with lifecycle hooks and derivation
//! combinators.
//!
//! A [`Delay`] is pure data: a duration plus pluggable hooks observing the
//! wait. Combinators derive new delays ([`multiplied_by`](Delay::multiplied_by),
//! [`randomized`](Delay::randomized)) or whole delay sequences
//! ([`backoff`](Delay::backoff), [`fibonacci`](Delay::fibonacci),
//! [`timed`](Delay::timed)) without ever mutating the original.
//!
//! The two wait primitives are the only effectful code here:
//! [`synchronously`](Delay::synchronously) suspends the calling thread,
//! [`asynchronously`](Delay::asynchronously) suspends a task.

mod sequence;

pub use sequence::{Backoff, Deadline, DelaySequence, FibonacciBackoff, IntoDelaySequence};

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::{ConfigError, Interrupted};

/// Observer of a delay's lifecycle.
///
/// The `event` is whatever triggered the wait - for error-driven retries the
/// failing attempt's error, for value-driven retries the rejected value.
/// Defaults log via `tracing`; hooks should be quick and must not panic.
pub trait DelayHooks: Send + Sync {
    /// Called just before the wait begins.
    fn before_wait(&self, event: &dyn fmt::Debug) {
        tracing::debug!(event = ?event, "waiting before next attempt");
    }

    /// Called after the wait completed in full.
    fn after_wait(&self, event: &dyn fmt::Debug) {
        tracing::debug!(event = ?event, "wait complete, retrying");
    }

    /// Called when the wait was cut short by a stop request.
    fn on_interrupted(&self, event: &dyn fmt::Debug) {
        tracing::warn!(event = ?event, "wait interrupted, giving up");
    }
}

/// The default hooks: log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHooks;

impl DelayHooks for LogHooks {}

/// An immutable wait specification.
///
/// Compared and ordered by duration alone; hooks do not participate in
/// equality.
///
/// # Examples
///
/// ```rust
/// use resurge::Delay;
/// use std::time::Duration;
///
/// let base = Delay::of(Duration::from_millis(100));
/// let longer = base.multiplied_by(2.5).unwrap();
/// assert_eq!(longer.duration(), Duration::from_millis(250));
/// assert!(base < longer);
/// ```
#[derive(Clone)]
pub struct Delay {
    duration: Duration,
    hooks: Arc<dyn DelayHooks>,
}

impl Delay {
    /// A delay waiting for `duration`.
    ///
    /// `Duration` is unsigned, so a negative wait is unrepresentable and
    /// this constructor cannot fail.
    pub fn of(duration: Duration) -> Self {
        Self {
            duration,
            hooks: Arc::new(LogHooks),
        }
    }

    /// A delay waiting for `millis` milliseconds.
    pub fn of_millis(millis: u64) -> Self {
        Self::of(Duration::from_millis(millis))
    }

    /// The wait duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// This delay with different lifecycle hooks.
    pub fn with_hooks(self, hooks: impl DelayHooks + 'static) -> Self {
        Self {
            duration: self.duration,
            hooks: Arc::new(hooks),
        }
    }

    /// A delay `factor` times as long, rounded up to whole milliseconds.
    ///
    /// Scaling works in whole milliseconds: any sub-millisecond component of
    /// this delay is dropped before the factor applies, so a delay shorter
    /// than one millisecond scales to zero. The same granularity applies to
    /// every combinator built on scaling ([`backoff`](Delay::backoff),
    /// [`fibonacci`](Delay::fibonacci), [`randomized`](Delay::randomized)).
    ///
    /// Errors when `factor` is negative or non-finite.
    pub fn multiplied_by(&self, factor: f64) -> Result<Self, ConfigError> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::NegativeFactor(factor));
        }
        Ok(self.scaled(factor))
    }

    /// Scale without validation; callers have already vetted the factor.
    /// Saturates on overflow rather than wrapping.
    pub(crate) fn scaled(&self, factor: f64) -> Self {
        let millis = (self.duration.as_millis() as f64 * factor).ceil();
        Self {
            duration: Duration::from_millis(millis as u64),
            hooks: Arc::clone(&self.hooks),
        }
    }

    /// A lazy geometric sequence of `size` delays where element *i* is this
    /// delay multiplied by `multiplier^i`.
    ///
    /// Errors when `multiplier` is not finite and strictly positive.
    /// `size` 0 yields an empty sequence.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use resurge::{Delay, DelaySequence};
    /// use std::time::Duration;
    ///
    /// let backoff = Delay::of_millis(100).backoff(2.0, 4).unwrap();
    /// assert_eq!(backoff.get(3).unwrap().duration(), Duration::from_millis(800));
    /// ```
    pub fn backoff(&self, multiplier: f64, size: usize) -> Result<Backoff, ConfigError> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::NonPositiveMultiplier(multiplier));
        }
        Ok(Backoff {
            base: self.clone(),
            multiplier,
            size,
        })
    }

    /// A lazy sequence of `size` delays where element *i* is this delay
    /// multiplied by the (*i* + 1)th Fibonacci number.
    ///
    /// The multiplier comes from Binet's closed-form approximation, not the
    /// integer recurrence, so expect drift at large indices.
    pub fn fibonacci(&self, size: usize) -> FibonacciBackoff {
        FibonacciBackoff {
            base: self.clone(),
            size,
        }
    }

    /// This delay multiplied by `1 + (r - 0.5) * 2 * randomness` for a fresh
    /// random `r` in `[0, 1)`.
    ///
    /// `randomness` 0 is the identity; 1 spreads the result over roughly
    /// zero to double the original. Errors when `randomness` is outside
    /// `[0, 1]`.
    pub fn randomized<R>(&self, rng: &mut R, randomness: f64) -> Result<Self, ConfigError>
    where
        R: rand::Rng + ?Sized,
    {
        if !(0.0..=1.0).contains(&randomness) {
            return Err(ConfigError::RandomnessOutOfRange(randomness));
        }
        let factor = 1.0 + (rng.random::<f64>() - 0.5) * 2.0 * randomness;
        Ok(self.scaled(factor))
    }

    /// A deadline-bounded view over `list`, using this delay's duration as
    /// the time budget.
    ///
    /// The deadline is `clock.now() + self.duration()` captured here, once.
    /// Afterwards the view re-reads the clock on every access: elements whose
    /// wait would overrun the deadline are out of range, and the whole view
    /// reports empty at or past the deadline. A budget too large to represent
    /// as an instant means no deadline: the view never shrinks. See
    /// [`Deadline`].
    pub fn timed<C: Clock + 'static>(&self, list: Arc<dyn DelaySequence>, clock: C) -> Deadline {
        let deadline = clock.now().checked_add(self.duration);
        Deadline {
            inner: list,
            deadline,
            clock: Arc::new(clock),
        }
    }

    /// Wait out this delay on the current thread.
    ///
    /// Runs `before_wait`, suspends for the full duration, then `after_wait`.
    /// A tripped `token` ends the wait early: `on_interrupted` runs and
    /// `Err(Interrupted)` is returned - terminal, never retried.
    pub fn synchronously(
        &self,
        event: &dyn fmt::Debug,
        token: &CancelToken,
    ) -> Result<(), Interrupted> {
        self.hooks.before_wait(event);
        if token.wait_timeout(self.duration) {
            self.hooks.on_interrupted(event);
            Err(Interrupted)
        } else {
            self.hooks.after_wait(event);
            Ok(())
        }
    }

    /// Wait out this delay as a pending timer, blocking no thread.
    ///
    /// Runs `before_wait`, suspends the task for the duration, then
    /// `after_wait`. Cancelling `token` while the timer is pending runs
    /// `on_interrupted` and resolves to `Err(Interrupted)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use resurge::Delay;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// tokio_test::block_on(async {
    ///     let token = CancellationToken::new();
    ///     let waited = Delay::of_millis(1).asynchronously(&"reconnect", &token).await;
    ///     assert!(waited.is_ok());
    ///
    ///     token.cancel();
    ///     let cut_short = Delay::of_millis(1).asynchronously(&"reconnect", &token).await;
    ///     assert!(cut_short.is_err());
    /// });
    /// ```
    #[cfg(feature = "async")]
    pub async fn asynchronously<Ev: fmt::Debug + Sync>(
        &self,
        event: &Ev,
        token: &tokio_util::sync::CancellationToken,
    ) -> Result<(), Interrupted> {
        self.hooks.before_wait(event);
        tokio::select! {
            _ = token.cancelled() => {
                self.hooks.on_interrupted(event);
                Err(Interrupted)
            }
            _ = tokio::time::sleep(self.duration) => {
                self.hooks.after_wait(event);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delay")
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Delay {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}

impl Eq for Delay {}

impl PartialOrd for Delay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delay {
    fn cmp(&self, other: &Self) -> Ordering {
        self.duration.cmp(&other.duration)
    }
}
