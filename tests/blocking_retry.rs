//! End-to-end scenarios for the blocking driver.

use resurge::{Condition, Delay, Runner, RetryError};
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
enum ApiError {
    Io,
    RateLimited,
    NotFound,
}

fn io_only() -> Condition<ApiError> {
    Condition::when(|e: &ApiError| matches!(e, ApiError::Io))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn io_errors_retried_then_success() {
    init_tracing();
    let runner = Runner::new()
        .upon(io_only(), vec![Delay::of_millis(10), Delay::of_millis(20)])
        .unwrap();

    let mut attempts = 0;
    let start = Instant::now();
    let result = runner.retry_blockingly(|| {
        attempts += 1;
        if attempts < 3 {
            Err(ApiError::Io)
        } else {
            Ok("ok")
        }
    });

    // 10ms after attempt 1, 20ms after attempt 2; success surfaces the
    // value and keeps the two recorded failures internal.
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(attempts, 3);
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[test]
fn uncovered_error_propagates_unchanged() {
    let runner = Runner::new()
        .upon(io_only(), vec![Delay::of_millis(10)])
        .unwrap();

    let result: Result<(), _> = runner.retry_blockingly(|| Err(ApiError::NotFound));
    match result.unwrap_err() {
        RetryError::Failed { error, history } => {
            assert_eq!(error, ApiError::NotFound);
            assert!(history.is_empty());
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn exhaustion_attaches_prior_errors() {
    init_tracing();
    let runner = Runner::new()
        .upon(io_only(), vec![Delay::of_millis(1), Delay::of_millis(1)])
        .unwrap();

    let result: Result<(), _> = runner.retry_blockingly(|| Err(ApiError::Io));
    match result.unwrap_err() {
        RetryError::Failed { error, history } => {
            assert_eq!(error, ApiError::Io);
            assert_eq!(history, vec![ApiError::Io, ApiError::Io]);
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn identity_of_error_is_irrelevant_only_the_condition_matters() {
    // A rule with N delays permits exactly N retries across *different*
    // matching errors.
    let runner = Runner::new()
        .upon(
            Condition::when(|e: &ApiError| !matches!(e, ApiError::NotFound)),
            vec![Delay::of_millis(1), Delay::of_millis(1)],
        )
        .unwrap();

    let mut attempts = 0;
    let result: Result<(), _> = runner.retry_blockingly(|| {
        attempts += 1;
        if attempts % 2 == 0 {
            Err(ApiError::RateLimited)
        } else {
            Err(ApiError::Io)
        }
    });

    assert_eq!(attempts, 3);
    assert!(matches!(result.unwrap_err(), RetryError::Failed { .. }));
}

#[test]
fn rules_consulted_in_declaration_order() {
    // The specific rule shadows the catch-all for Io; other errors fall
    // through to the catch-all.
    let runner = Runner::new()
        .upon(io_only(), vec![Delay::of_millis(1)])
        .unwrap()
        .upon(Condition::any(), vec![Delay::of_millis(1); 10])
        .unwrap();

    let mut attempts = 0;
    let result: Result<(), _> = runner.retry_blockingly(|| {
        attempts += 1;
        Err(ApiError::Io)
    });

    // The Io rule exhausts after one retry and the plan refuses; the
    // catch-all's ten delays never apply to an error the first rule matched.
    assert_eq!(attempts, 2);
    assert!(matches!(result.unwrap_err(), RetryError::Failed { .. }));
}

#[test]
fn return_value_retries_end_with_the_value() {
    let runner = Runner::<ApiError>::new()
        .upon_return(
            "bad".to_string(),
            vec![Delay::of_millis(10), Delay::of_millis(10)],
        )
        .unwrap();

    let mut attempts = 0;
    let result = runner.retry_blockingly(|| {
        attempts += 1;
        Ok("bad".to_string())
    });

    // 3 attempts, then the bad value is returned as a normal result.
    assert_eq!(attempts, 3);
    assert_eq!(result.unwrap(), "bad");
}

#[test]
fn mixed_value_and_error_triggers_share_one_loop() {
    let runner = Runner::new()
        .upon(io_only(), vec![Delay::of_millis(1); 3])
        .unwrap()
        .if_returns(|v: &u32| *v == 0, vec![Delay::of_millis(1); 3])
        .unwrap();

    let mut attempts = 0;
    let result = runner.retry_blockingly(|| {
        attempts += 1;
        match attempts {
            1 => Err(ApiError::Io), // error-triggered retry
            2 => Ok(0),             // value-triggered retry
            _ => Ok(7),
        }
    });

    assert_eq!(result.unwrap(), 7);
    assert_eq!(attempts, 3);
}
