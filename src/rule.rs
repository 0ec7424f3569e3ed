//! Error conditions and the rules binding them to delay strategies.

use std::fmt;
use std::sync::Arc;

use crate::delay::{Delay, DelaySequence};

/// A matcher over errors of type `E`.
///
/// Conditions are stored closures - no runtime type introspection. The
/// reserved [`interruption`](Condition::interruption) sentinel names the stop
/// signal; plans reject it at configuration time because interruption must
/// never be retried.
///
/// # Examples
///
/// ```rust
/// use resurge::Condition;
///
/// let transient = Condition::when(|e: &&str| e.starts_with("transient"));
/// assert!(transient.matches(&"transient: connection reset"));
/// assert!(!transient.matches(&"fatal: corrupt state"));
///
/// assert!(Condition::<&str>::any().matches(&"anything"));
/// assert!(!Condition::<&str>::interruption().matches(&"anything"));
/// ```
pub struct Condition<E> {
    kind: CondKind<E>,
}

enum CondKind<E> {
    Predicate(Arc<dyn Fn(&E) -> bool + Send + Sync>),
    Any,
    Interruption,
}

// Not derived: deriving would demand E: Clone, but conditions only share
// their predicate.
impl<E> Clone for Condition<E> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            CondKind::Predicate(p) => CondKind::Predicate(Arc::clone(p)),
            CondKind::Any => CondKind::Any,
            CondKind::Interruption => CondKind::Interruption,
        };
        Self { kind }
    }
}

impl<E> Condition<E> {
    /// A condition satisfied when `predicate` returns true.
    pub fn when(predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        Self {
            kind: CondKind::Predicate(Arc::new(predicate)),
        }
    }

    /// A condition satisfied by every error.
    ///
    /// "Every error" still excludes interruption, which is routed around the
    /// plan entirely.
    pub fn any() -> Self {
        Self {
            kind: CondKind::Any,
        }
    }

    /// The reserved interruption sentinel.
    ///
    /// Registering a rule with this condition fails with
    /// [`ConfigError::InterruptionNotRetryable`](crate::ConfigError::InterruptionNotRetryable);
    /// it exists so that the misuse is expressible and rejected loudly
    /// instead of silently ignored.
    pub fn interruption() -> Self {
        Self {
            kind: CondKind::Interruption,
        }
    }

    /// This condition refined by a further predicate: both must hold.
    ///
    /// The usual shape is a broad error-kind condition narrowed by a
    /// detail check:
    ///
    /// ```rust
    /// use resurge::Condition;
    ///
    /// let retryable = Condition::when(|e: &(u16, &str)| e.0 >= 500)
    ///     .and(|e: &(u16, &str)| e.1 != "shutting down");
    /// assert!(retryable.matches(&(503, "overloaded")));
    /// assert!(!retryable.matches(&(503, "shutting down")));
    /// ```
    pub fn and(self, refinement: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self
    where
        E: 'static,
    {
        // Refining the interruption sentinel must not launder it into a
        // plain predicate that plans would accept.
        if self.is_interruption() {
            return self;
        }
        Self {
            kind: CondKind::Predicate(Arc::new(move |error: &E| {
                self.matches(error) && refinement(error)
            })),
        }
    }

    /// Whether this condition covers `error`. Pure.
    pub fn matches(&self, error: &E) -> bool {
        match &self.kind {
            CondKind::Predicate(p) => p(error),
            CondKind::Any => true,
            CondKind::Interruption => false,
        }
    }

    pub(crate) fn is_interruption(&self) -> bool {
        matches!(self.kind, CondKind::Interruption)
    }
}

impl<E> fmt::Debug for Condition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            CondKind::Predicate(_) => "Predicate",
            CondKind::Any => "Any",
            CondKind::Interruption => "Interruption",
        };
        f.debug_tuple("Condition").field(&name).finish()
    }
}

/// One plan entry: a condition bound to an ordered strategy sequence, plus a
/// cursor tracking how many strategies have been consumed.
///
/// Rules are immutable; [`remaining`](Rule::remaining) returns a successor
/// with the cursor advanced, sharing the same condition and strategies.
pub struct Rule<E> {
    condition: Condition<E>,
    strategies: Arc<dyn DelaySequence>,
    cursor: usize,
}

impl<E> Clone for Rule<E> {
    fn clone(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            strategies: Arc::clone(&self.strategies),
            cursor: self.cursor,
        }
    }
}

impl<E> Rule<E> {
    pub(crate) fn new(condition: Condition<E>, strategies: Arc<dyn DelaySequence>) -> Self {
        Self {
            condition,
            strategies,
            cursor: 0,
        }
    }

    /// Whether this rule's condition covers `error`.
    pub fn matches(&self, error: &E) -> bool {
        self.condition.matches(error)
    }

    /// The next delay to wait, if any strategy remains.
    ///
    /// `None` once the cursor has consumed every strategy, and also when the
    /// sequence has shrunk underneath the cursor - a deadline view does this
    /// as wall-clock time passes, so the bounds check and the access are
    /// deliberately both delegated to `get`.
    pub fn current_strategy(&self) -> Option<Delay> {
        self.strategies.get(self.cursor)
    }

    /// A successor rule with one more strategy consumed.
    ///
    /// Shares this rule's condition and strategy sequence; nothing is copied
    /// or mutated.
    pub fn remaining(&self) -> Self {
        Self {
            condition: self.condition.clone(),
            strategies: Arc::clone(&self.strategies),
            cursor: self.cursor + 1,
        }
    }

    pub(crate) fn condition(&self) -> &Condition<E> {
        &self.condition
    }

    pub(crate) fn strategies(&self) -> &Arc<dyn DelaySequence> {
        &self.strategies
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn at_cursor(
        condition: Condition<E>,
        strategies: Arc<dyn DelaySequence>,
        cursor: usize,
    ) -> Self {
        Self {
            condition,
            strategies,
            cursor,
        }
    }
}

impl<E> fmt::Debug for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("condition", &self.condition)
            .field("cursor", &self.cursor)
            .field("strategies_len", &self.strategies.len())
            .finish()
    }
}

#[cfg(test)]
mod rule_tests {
    use super::*;
    use crate::delay::IntoDelaySequence;

    fn delays(n: usize) -> Arc<dyn DelaySequence> {
        (0..n)
            .map(|i| Delay::of_millis(10 * (i as u64 + 1)))
            .collect::<Vec<_>>()
            .into_sequence()
    }

    #[test]
    fn test_condition_when() {
        let even = Condition::when(|n: &i32| n % 2 == 0);
        assert!(even.matches(&4));
        assert!(!even.matches(&5));
    }

    #[test]
    fn test_condition_interruption_never_matches() {
        let cond = Condition::<i32>::interruption();
        assert!(!cond.matches(&0));
        assert!(cond.is_interruption());
    }

    #[test]
    fn test_current_strategy_walks_sequence() {
        let rule = Rule::new(Condition::<i32>::any(), delays(2));
        assert_eq!(rule.current_strategy().unwrap().duration().as_millis(), 10);

        let rule = rule.remaining();
        assert_eq!(rule.current_strategy().unwrap().duration().as_millis(), 20);

        let rule = rule.remaining();
        assert!(rule.current_strategy().is_none());
    }

    #[test]
    fn test_remaining_leaves_original_untouched() {
        let rule = Rule::new(Condition::<i32>::any(), delays(2));
        let _advanced = rule.remaining();
        assert_eq!(rule.cursor(), 0);
        assert_eq!(rule.current_strategy().unwrap().duration().as_millis(), 10);
    }

    #[test]
    fn test_cursor_past_bounds_is_tolerated() {
        let rule = Rule::at_cursor(Condition::<i32>::any(), delays(1), 5);
        assert!(rule.current_strategy().is_none());
    }
}
