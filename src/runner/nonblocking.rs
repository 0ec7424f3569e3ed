//! The non-blocking driver: waits are pending timers, never blocked threads.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Interrupted, RetryError};
use crate::plan::Plan;
use crate::runner::Runner;

impl<E> Runner<E>
where
    E: fmt::Debug + Send + Sync + 'static,
{
    /// Drive `operation` without blocking any thread, returning a cancellable
    /// handle immediately.
    ///
    /// The operation is a factory called once per attempt. Calling it may
    /// fail outright (`Err` from the factory - the analogue of an error
    /// raised before any work was scheduled) or yield a future whose output
    /// decides the attempt.
    ///
    /// The first factory call runs here, synchronously on the caller's
    /// thread, so programming errors surface immediately: a first-call `Err`
    /// that no rule covers fails the handle without entering the loop at all
    /// (see [`Plan::any_matches`]). Everything afterwards - awaiting
    /// attempts, waiting out delays, re-invoking the factory with the
    /// successor plan - runs as one task spawned on `scheduler`, so attempts
    /// of one invocation are strictly sequential.
    ///
    /// [`RetryHandle::cancel`] aborts any pending wait or attempt and
    /// resolves the handle to [`RetryError::Interrupted`].
    pub fn retry_async<T, F, Fut>(
        &self,
        mut operation: F,
        scheduler: &tokio::runtime::Handle,
    ) -> RetryHandle<T, E>
    where
        T: Send + 'static,
        F: FnMut() -> Result<Fut, E> + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let plan = self.plan().clone();

        match operation() {
            Err(error) if !plan.any_matches(&error) => {
                tracing::debug!(error = ?error, "first attempt failed uncovered");
                RetryHandle::ready(
                    Err(RetryError::Failed {
                        error,
                        history: Vec::new(),
                    }),
                    token,
                )
            }
            first => {
                let task = scheduler.spawn(drive(plan, operation, first, token.clone()));
                RetryHandle {
                    token,
                    state: HandleState::Running(task),
                }
            }
        }
    }
}

/// The scheduled retry loop; one task per invocation.
async fn drive<T, E, F, Fut>(
    mut plan: Plan<E>,
    mut operation: F,
    first: Result<Fut, E>,
    token: CancellationToken,
) -> Result<T, RetryError<E>>
where
    E: fmt::Debug + Send + Sync + 'static,
    F: FnMut() -> Result<Fut, E>,
    Fut: Future<Output = Result<T, E>>,
{
    let mut history: Vec<E> = Vec::new();
    let mut attempt = first;

    loop {
        let outcome = match attempt {
            Ok(fut) => {
                tokio::select! {
                    _ = token.cancelled() => return Err(RetryError::Interrupted(Interrupted)),
                    outcome = fut => outcome,
                }
            }
            Err(error) => Err(error),
        };

        match outcome {
            Ok(value) => return Ok(value),
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
                            "failure covered by plan, scheduling retry"
                        );
                        execution
                            .strategy
                            .asynchronously(&error, &token)
                            .await
                            .map_err(RetryError::Interrupted)?;
                        history.push(error);
                        plan = execution.plan;
                        attempt = operation();
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

enum HandleState<T, E> {
    /// Resolved before any task was spawned.
    Ready(Option<Result<T, RetryError<E>>>),
    Running(JoinHandle<Result<T, RetryError<E>>>),
}

/// A cancellable, future-like handle to a non-blocking retry invocation.
///
/// Awaiting it yields the operation's value, the propagated error, or
/// [`RetryError::Interrupted`] after [`cancel`](RetryHandle::cancel).
pub struct RetryHandle<T, E> {
    token: CancellationToken,
    state: HandleState<T, E>,
}

impl<T, E> RetryHandle<T, E> {
    fn ready(result: Result<T, RetryError<E>>, token: CancellationToken) -> Self {
        Self {
            token,
            state: HandleState::Ready(Some(result)),
        }
    }

    /// Stop the invocation.
    ///
    /// A pending scheduled wait or in-flight attempt is cancelled; the
    /// continuation never re-invokes the operation, and awaiting the handle
    /// yields [`RetryError::Interrupted`].
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once [`cancel`](RetryHandle::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// No field is ever structurally pinned: `JoinHandle` is `Unpin` and the ready
// result is only taken through `&mut`, so the handle is freely movable.
impl<T, E> Unpin for RetryHandle<T, E> {}

impl<T, E> Future for RetryHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            HandleState::Ready(slot) => {
                let result = slot.take().expect("RetryHandle polled after completion");
                Poll::Ready(result)
            }
            HandleState::Running(task) => match Pin::new(task).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(join_error)) => {
                    if join_error.is_cancelled() {
                        Poll::Ready(Err(RetryError::Interrupted(Interrupted)))
                    } else {
                        // The operation panicked; surface it on the awaiting
                        // task rather than swallowing it.
                        std::panic::resume_unwind(join_error.into_panic())
                    }
                }
            },
        }
    }
}

impl<T, E> fmt::Debug for RetryHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            HandleState::Ready(_) => "ready",
            HandleState::Running(_) => "running",
        };
        f.debug_struct("RetryHandle")
            .field("state", &state)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
