//! Immutable retry plans: ordered rules, first match wins.

use std::fmt;

use crate::delay::{Delay, IntoDelaySequence};
use crate::error::ConfigError;
use crate::rule::{Condition, Rule};

/// An ordered, immutable collection of [`Rule`]s.
///
/// Rules are consulted in declaration order and the first whose condition
/// covers the error decides the outcome. Every operation returns a new plan;
/// a plan in hand is never mutated, so one plan value can serve any number of
/// concurrently running invocations, each threading its own successors.
///
/// # Examples
///
/// ```rust
/// use resurge::{Condition, Delay, Plan};
///
/// let plan = Plan::new()
///     .devise(
///         Condition::when(|e: &&str| e.starts_with("io")),
///         vec![Delay::of_millis(10), Delay::of_millis(20)],
///     )
///     .unwrap();
///
/// let execution = plan.execute(&"io: reset").expect("covered");
/// assert_eq!(execution.strategy.duration().as_millis(), 10);
///
/// // The original plan still yields the first delay; only the successor
/// // returned inside the execution has advanced.
/// assert_eq!(plan.execute(&"io: reset").unwrap().strategy.duration().as_millis(), 10);
/// assert_eq!(
///     execution.plan.execute(&"io: reset").unwrap().strategy.duration().as_millis(),
///     20,
/// );
/// ```
pub struct Plan<E> {
    rules: Vec<Rule<E>>,
}

impl<E> Clone for Plan<E> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

/// One successful plan match: the delay to wait, and the successor plan to
/// continue with. Transient; never stored by the engine.
pub struct Execution<E> {
    /// The delay chosen for this failure.
    pub strategy: Delay,
    /// The plan for all subsequent failures of this invocation.
    pub plan: Plan<E>,
}

impl<E> Plan<E> {
    /// An empty plan covering nothing.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// A new plan with one more rule appended, leaving `self` untouched.
    ///
    /// Rejects the reserved interruption condition: interruption is a stop
    /// request, and configuring a retry for it is an error raised here,
    /// synchronously, before any attempt runs.
    pub fn devise(
        &self,
        condition: Condition<E>,
        strategies: impl IntoDelaySequence,
    ) -> Result<Self, ConfigError> {
        if condition.is_interruption() {
            return Err(ConfigError::InterruptionNotRetryable);
        }
        let mut rules = self.rules.clone();
        rules.push(Rule::new(condition, strategies.into_sequence()));
        Ok(Self { rules })
    }

    /// Match `error` against the rules and pick the next delay.
    ///
    /// Scans in declaration order. The first matching rule is the applicable
    /// one; the returned successor plan substitutes its advanced twin for
    /// that single rule and carries every other rule over unchanged - later
    /// rules that also match are deliberately not advanced. This
    /// first-match-only priority is pinned behavior, not an accident.
    ///
    /// `None` means the plan refuses: either no rule matched, or the first
    /// matching rule has no strategy left. The caller propagates the error
    /// as-is in both cases.
    pub fn execute(&self, error: &E) -> Option<Execution<E>> {
        let applicable = self.rules.iter().position(|rule| rule.matches(error))?;
        let strategy = self.rules[applicable].current_strategy()?;
        let rules = self
            .rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                if i == applicable {
                    rule.remaining()
                } else {
                    rule.clone()
                }
            })
            .collect();
        Some(Execution {
            strategy,
            plan: Self { rules },
        })
    }

    /// True iff some rule's condition covers `error`.
    ///
    /// Unlike [`execute`](Plan::execute) this ignores cursors entirely; it
    /// answers "was this kind of error ever configured for retry", which the
    /// async driver uses to decide whether an error raised while creating
    /// the very first attempt deserves the retry loop at all.
    pub fn any_matches(&self, error: &E) -> bool {
        self.rules.iter().any(|rule| rule.matches(error))
    }

    /// Number of rules in this plan.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the plan holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn rules(&self) -> &[Rule<E>] {
        &self.rules
    }

    pub(crate) fn from_rules(rules: Vec<Rule<E>>) -> Self {
        Self { rules }
    }
}

impl<E> Default for Plan<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Plan<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan").field("rules", &self.rules).finish()
    }
}

impl<E> fmt::Debug for Execution<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("strategy", &self.strategy)
            .field("plan", &self.plan)
            .finish()
    }
}
