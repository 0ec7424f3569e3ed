//! Property tests for delay sequences and plan bookkeeping.

use proptest::prelude::*;
use resurge::delay::IntoDelaySequence;
use resurge::{Condition, Delay, DelaySequence, Plan};
use std::time::Duration;

proptest! {
    #[test]
    fn backoff_has_requested_length(base in 1u64..1000, multiplier in 0.1f64..8.0, size in 0usize..64) {
        let seq = Delay::of_millis(base).backoff(multiplier, size).unwrap();
        prop_assert_eq!(seq.len(), size);
        for i in 0..size {
            prop_assert!(seq.get(i).is_some());
        }
        prop_assert!(seq.get(size).is_none());
    }

    #[test]
    fn backoff_non_decreasing_for_growing_multiplier(base in 1u64..1000, multiplier in 1.0f64..8.0, size in 1usize..32) {
        let seq = Delay::of_millis(base).backoff(multiplier, size).unwrap();
        let mut prev = Duration::ZERO;
        for i in 0..size {
            let d = seq.get(i).unwrap().duration();
            prop_assert!(d >= prev, "element {} shrank: {:?} < {:?}", i, d, prev);
            prev = d;
        }
    }

    #[test]
    fn fibonacci_non_decreasing(base in 1u64..1000, size in 1usize..32) {
        let seq = Delay::of_millis(base).fibonacci(size);
        let mut prev = Duration::ZERO;
        for i in 0..size {
            let d = seq.get(i).unwrap().duration();
            prop_assert!(d >= prev);
            prev = d;
        }
    }

    #[test]
    fn randomized_within_band(base in 1u64..10_000, randomness in 0.0f64..=1.0) {
        let mut rng = rand::rng();
        let delay = Delay::of_millis(base).randomized(&mut rng, randomness).unwrap();
        let spread = (base as f64 * randomness).ceil() as u64;
        let low = Duration::from_millis(base.saturating_sub(spread));
        // Ceiling rounds at most one millisecond past the band.
        let high = Duration::from_millis(base + spread + 1);
        prop_assert!(delay.duration() >= low && delay.duration() <= high);
    }

    #[test]
    fn plan_permits_exactly_n_retries(n in 0usize..16) {
        let delays: Vec<_> = (0..n).map(|_| Delay::of_millis(0)).collect();
        let mut plan = Plan::new()
            .devise(Condition::<u8>::any(), delays)
            .unwrap();
        let mut granted = 0;
        while let Some(execution) = plan.execute(&0u8) {
            granted += 1;
            plan = execution.plan;
            prop_assert!(granted <= n, "plan granted more retries than delays");
        }
        prop_assert_eq!(granted, n);
    }

    #[test]
    fn execute_never_touches_later_matching_rules(first_len in 1usize..8, second_len in 1usize..8) {
        let plan = Plan::new()
            .devise(Condition::<u8>::any(), vec![Delay::of_millis(1); first_len])
            .unwrap()
            .devise(Condition::<u8>::any(), vec![Delay::of_millis(2); second_len])
            .unwrap();

        let mut plan = plan;
        let mut steps = 0;
        while let Some(execution) = plan.execute(&0u8) {
            // Only the first rule is ever consulted, so the chosen delay is
            // always the first rule's.
            prop_assert_eq!(execution.strategy.duration().as_millis(), 1);
            plan = execution.plan;
            steps += 1;
        }
        prop_assert_eq!(steps, first_len);
    }
}

#[test]
fn deadline_view_shrinks_with_the_clock() {
    use resurge::clock::ManualClock;

    let clock = ManualClock::new();
    let inner = vec![Delay::of_millis(10); 4].into_sequence();
    let view = Delay::of_millis(100).timed(inner, clock.clone());

    assert_eq!(view.len(), 4);
    clock.advance(Duration::from_millis(99));
    assert_eq!(view.len(), 4); // deadline still ahead
    assert!(view.get(0).is_none()); // but no 10ms wait fits any more
    clock.advance(Duration::from_millis(1));
    assert_eq!(view.len(), 0);
}
