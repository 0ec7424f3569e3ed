//! # Resurge
//!
//! Declarative retry orchestration: decide whether, how many times, and after
//! how long to retry a failing operation, according to an immutable plan
//! mapping error conditions to ordered backoff strategies.
//!
//! ## Model
//!
//! - A [`Delay`] is an immutable wait specification with lifecycle hooks and
//!   combinators deriving backoff, Fibonacci, randomized, and
//!   deadline-bounded variants.
//! - A [`Rule`] binds a [`Condition`] over errors to an ordered sequence of
//!   delays, consumed one per retry.
//! - A [`Plan`] is an ordered rule list: first match wins, and every match
//!   returns a successor plan instead of mutating anything.
//! - A [`Runner`] drives the loop, blocking
//!   ([`retry_blockingly`](Runner::retry_blockingly)) or non-blocking
//!   (`retry_async`, behind the `async` feature).
//!
//! Because plans are values, one configured runner can serve any number of
//! concurrent invocations without locks; each invocation threads its own
//! successors.
//!
//! ## Quick Example
//!
//! ```rust
//! use resurge::{Condition, Delay, Runner};
//!
//! #[derive(Debug)]
//! enum ApiError {
//!     Timeout,
//!     BadRequest,
//! }
//!
//! let runner = Runner::new()
//!     .upon(
//!         Condition::when(|e: &ApiError| matches!(e, ApiError::Timeout)),
//!         Delay::of_millis(10).backoff(2.0, 3).unwrap(),
//!     )
//!     .unwrap();
//!
//! let mut attempts = 0;
//! let result = runner.retry_blockingly(|| {
//!     attempts += 1;
//!     if attempts < 3 { Err(ApiError::Timeout) } else { Ok("ok") }
//! });
//!
//! assert_eq!(result.unwrap(), "ok");
//! assert_eq!(attempts, 3);
//! ```
//!
//! Retrying on an undesirable *return value* instead of an error goes
//! through the same loop via [`Runner::if_returns`] / [`Runner::upon_return`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cancel;
pub mod clock;
pub mod delay;
pub mod error;
pub mod plan;
pub mod rule;
pub mod runner;

// Re-exports
pub use cancel::CancelToken;
pub use clock::{Clock, SystemClock};
pub use delay::{Backoff, Deadline, Delay, DelayHooks, DelaySequence, FibonacciBackoff};
pub use error::{ConfigError, Interrupted, RetryError};
pub use plan::{Execution, Plan};
pub use rule::{Condition, Rule};
pub use runner::{ReturnRunner, Runner};

#[cfg(feature = "async")]
pub use runner::RetryHandle;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelToken;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::delay::{Delay, DelayHooks, DelaySequence, IntoDelaySequence};
    pub use crate::error::{ConfigError, Interrupted, RetryError};
    pub use crate::plan::{Execution, Plan};
    pub use crate::rule::{Condition, Rule};
    pub use crate::runner::{ReturnRunner, Runner};

    #[cfg(feature = "async")]
    pub use crate::runner::RetryHandle;
}
