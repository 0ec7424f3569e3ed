//! The blocking driver: attempts and sleeps on the caller's thread.

use std::fmt;

use crate::error::{Interrupted, RetryError};
use crate::runner::Runner;

impl<E: fmt::Debug> Runner<E> {
    /// Invoke `operation` until it succeeds, the plan refuses, or the stop
    /// signal trips.
    ///
    /// The loop: invoke; on success return the value. On failure, a tripped
    /// cancel token ends the invocation immediately without consulting the
    /// plan. Otherwise the plan picks the next delay - covered errors are
    /// recorded, waited out on this thread, and the loop continues with the
    /// successor plan; an uncovered or exhausted error comes back as
    /// [`RetryError::Failed`] carrying every previously recorded error.
    ///
    /// A cancellation arriving mid-sleep is also terminal and yields
    /// [`RetryError::Interrupted`].
    pub fn retry_blockingly<T, F>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut plan = self.plan().clone();
        let mut history: Vec<E> = Vec::new();
        let token = self.cancel_token();

        loop {
            match operation() {
                Ok(value) => {
                    if !history.is_empty() {
                        tracing::debug!(
                            attempts = history.len() + 1,
                            "operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if token.is_cancelled() {
                        return Err(RetryError::Interrupted(Interrupted));
                    }
                    match plan.execute(&error) {
                        Some(execution) => {
                            tracing::trace!(
                                error = ?error,
                                delay = ?execution.strategy.duration(),
                                attempt = history.len() + 1,
                                "failure covered by plan"
                            );
                            if execution.strategy.synchronously(&error, token).is_err() {
                                return Err(RetryError::Interrupted(Interrupted));
                            }
                            history.push(error);
                            plan = execution.plan;
                        }
                        None => {
                            tracing::debug!(
                                error = ?error,
                                attempts = history.len() + 1,
                                "plan refused, propagating"
                            );
                            return Err(RetryError::Failed { error, history });
                        }
                    }
                }
            }
        }
    }
}
