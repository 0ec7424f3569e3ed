//! Ordered delay strategies and their lazy views.
//!
//! A rule does not hold a materialized list of delays; it holds anything that
//! can answer `len()` and `get(i)`. Both are re-evaluated on every access, so
//! a view may compute elements on demand (backoff, Fibonacci) or shrink as
//! wall-clock time passes (deadline view).

use std::sync::Arc;
use std::time::Instant;

use crate::clock::Clock;
use crate::delay::Delay;

/// An ordered sequence of [`Delay`]s consulted one element at a time.
///
/// Implementations must be pure with respect to their own state: `get` and
/// `len` may depend on a clock, but never on how often they were called.
pub trait DelaySequence: Send + Sync {
    /// Number of delays currently visible in this sequence.
    fn len(&self) -> usize;

    /// The delay at `index`, or `None` when the index is out of range.
    fn get(&self, index: usize) -> Option<Delay>;

    /// True when no delays are visible.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DelaySequence for Vec<Delay> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<Delay> {
        self.as_slice().get(index).cloned()
    }
}

/// Conversion into a shareable strategy list.
///
/// Lets configuration calls accept a plain `Vec<Delay>`, a lazy view, or an
/// already-shared sequence interchangeably.
pub trait IntoDelaySequence {
    /// Wrap `self` for shared, immutable consultation.
    fn into_sequence(self) -> Arc<dyn DelaySequence>;
}

impl<S: DelaySequence + 'static> IntoDelaySequence for S {
    fn into_sequence(self) -> Arc<dyn DelaySequence> {
        Arc::new(self)
    }
}

impl IntoDelaySequence for Arc<dyn DelaySequence> {
    fn into_sequence(self) -> Arc<dyn DelaySequence> {
        self
    }
}

/// Lazy geometric backoff: element *i* is the base delay scaled by
/// `multiplier^i`.
///
/// Built by [`Delay::backoff`]. Fixed length; elements are computed on
/// access, never stored.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub(crate) base: Delay,
    pub(crate) multiplier: f64,
    pub(crate) size: usize,
}

impl DelaySequence for Backoff {
    fn len(&self) -> usize {
        self.size
    }

    fn get(&self, index: usize) -> Option<Delay> {
        if index >= self.size {
            return None;
        }
        Some(self.base.scaled(self.multiplier.powi(index as i32)))
    }
}

/// Lazy Fibonacci backoff: element *i* is the base delay scaled by
/// `fib(i + 1)`.
///
/// Built by [`Delay::fibonacci`]. Uses the closed-form Binet approximation
/// rather than the exact integer recurrence, so results drift from true
/// Fibonacci numbers as the index grows large.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    pub(crate) base: Delay,
    pub(crate) size: usize,
}

/// Binet's closed-form approximation of the nth Fibonacci number.
///
/// f64 precision only; exact for small n, increasingly off past n ≈ 70.
pub(crate) fn binet(n: u32) -> f64 {
    let sqrt5 = 5f64.sqrt();
    let phi = (1.0 + sqrt5) / 2.0;
    let psi = (1.0 - sqrt5) / 2.0;
    (phi.powi(n as i32) - psi.powi(n as i32)) / sqrt5
}

impl DelaySequence for FibonacciBackoff {
    fn len(&self) -> usize {
        self.size
    }

    fn get(&self, index: usize) -> Option<Delay> {
        if index >= self.size {
            return None;
        }
        Some(self.base.scaled(binet(index as u32 + 1)))
    }
}

/// A wall-clock-bounded view over another sequence.
///
/// Built by [`Delay::timed`]: the deadline is `clock.now() + budget` captured
/// at view creation. The view's contents shrink purely as a function of time,
/// re-evaluated on every access - this is not a snapshot:
///
/// - `len()` is the inner length while the deadline is ahead, 0 at or after
///   it.
/// - `get(i)` yields the inner element only if waiting it out would still
///   finish before the deadline; otherwise the index is out of range.
///
/// A budget too large for instant arithmetic leaves the view unbounded: it
/// behaves exactly like the inner sequence and never shrinks.
pub struct Deadline {
    pub(crate) inner: Arc<dyn DelaySequence>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl DelaySequence for Deadline {
    fn len(&self) -> usize {
        match self.deadline {
            Some(deadline) if self.clock.now() >= deadline => 0,
            _ => self.inner.len(),
        }
    }

    fn get(&self, index: usize) -> Option<Delay> {
        let delay = self.inner.get(index)?;
        let Some(deadline) = self.deadline else {
            return Some(delay);
        };
        // A wait whose end is unrepresentable cannot finish before any
        // deadline either.
        match self.clock.now().checked_add(delay.duration()) {
            Some(end) if end < deadline => Some(delay),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deadline")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod sequence_tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_vec_sequence() {
        let seq = vec![Delay::of_millis(10), Delay::of_millis(20)];
        assert_eq!(DelaySequence::len(&seq), 2);
        assert_eq!(DelaySequence::get(&seq, 1).unwrap().duration(), ms(20));
        assert!(DelaySequence::get(&seq, 2).is_none());
    }

    #[test]
    fn test_backoff_doubles() {
        let seq = Delay::of_millis(100).backoff(2.0, 4).unwrap();
        let delays: Vec<_> = (0..4).map(|i| seq.get(i).unwrap().duration()).collect();
        assert_eq!(delays, vec![ms(100), ms(200), ms(400), ms(800)]);
        assert!(seq.get(4).is_none());
    }

    #[test]
    fn test_backoff_size_zero_is_empty() {
        let seq = Delay::of_millis(100).backoff(2.0, 0).unwrap();
        assert_eq!(seq.len(), 0);
        assert!(seq.is_empty());
        assert!(seq.get(0).is_none());
    }

    #[test]
    fn test_fibonacci_multiples() {
        let seq = Delay::of_millis(100).fibonacci(5);
        let delays: Vec<_> = (0..5).map(|i| seq.get(i).unwrap().duration()).collect();
        // Binet is within f64 tolerance of [1, 1, 2, 3, 5] at these indices.
        assert_eq!(delays, vec![ms(100), ms(100), ms(200), ms(300), ms(500)]);
    }

    #[test]
    fn test_binet_tracks_small_fibonacci() {
        let exact = [1u64, 1, 2, 3, 5, 8, 13, 21, 34, 55];
        for (i, want) in exact.iter().enumerate() {
            let got = binet(i as u32 + 1);
            assert!(
                (got - *want as f64).abs() < 1e-6,
                "fib({}) approx {} want {}",
                i + 1,
                got,
                want
            );
        }
    }

    #[test]
    fn test_deadline_full_length_before_deadline() {
        let clock = ManualClock::new();
        let view = Delay::of_millis(100).timed(
            vec![Delay::of_millis(10), Delay::of_millis(20)].into_sequence(),
            clock.clone(),
        );
        assert_eq!(view.len(), 2);
        assert!(view.get(0).is_some());
    }

    #[test]
    fn test_deadline_empty_at_deadline() {
        let clock = ManualClock::new();
        let view = Delay::of_millis(100).timed(
            vec![Delay::of_millis(10)].into_sequence(),
            clock.clone(),
        );
        clock.advance(ms(100));
        assert_eq!(view.len(), 0);
        assert!(view.get(0).is_none());
    }

    #[test]
    fn test_deadline_rejects_delay_that_would_overrun() {
        let clock = ManualClock::new();
        let view = Delay::of_millis(50).timed(
            vec![Delay::of_millis(10), Delay::of_millis(60)].into_sequence(),
            clock.clone(),
        );
        // 60ms wait cannot finish inside the 50ms budget.
        assert!(view.get(0).is_some());
        assert!(view.get(1).is_none());
    }

    #[test]
    fn test_unrepresentable_budget_means_no_deadline() {
        let clock = ManualClock::new();
        let view = Delay::of(Duration::MAX).timed(
            vec![Delay::of_millis(10), Delay::of_millis(20)].into_sequence(),
            clock.clone(),
        );
        assert_eq!(view.len(), 2);
        assert!(view.get(0).is_some());
        clock.advance(Duration::from_secs(3600));
        // Never shrinks.
        assert_eq!(view.len(), 2);
        assert!(view.get(1).is_some());
    }

    #[test]
    fn test_unrepresentable_wait_end_is_out_of_range() {
        let clock = ManualClock::new();
        let view = Delay::of_millis(50).timed(
            vec![Delay::of(Duration::MAX)].into_sequence(),
            clock.clone(),
        );
        assert!(view.get(0).is_none());
    }

    #[test]
    fn test_deadline_shrinks_as_time_passes() {
        let clock = ManualClock::new();
        let view = Delay::of_millis(50).timed(
            vec![Delay::of_millis(30)].into_sequence(),
            clock.clone(),
        );
        assert!(view.get(0).is_some());
        clock.advance(ms(25));
        // 25ms elapsed + 30ms wait >= 50ms budget.
        assert!(view.get(0).is_none());
        assert_eq!(view.len(), 1); // deadline not yet reached
    }
}
