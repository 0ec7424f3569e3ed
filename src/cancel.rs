//! Stop signal for the blocking retry path.
//!
//! The blocking driver sleeps on the caller's thread, so cancellation has to
//! be able to wake a sleeper early. `CancelToken` pairs a flag with a condvar
//! for exactly that: `wait_timeout` is an interruptible sleep, and `cancel`
//! from any thread ends it immediately.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// A cloneable stop signal shared between a blocking retry invocation and
/// whoever may want to end it.
///
/// Once cancelled, a token stays cancelled.
///
/// # Examples
///
/// ```rust
/// use resurge::CancelToken;
/// use std::time::Duration;
///
/// let token = CancelToken::new();
/// let waker = token.clone();
/// std::thread::spawn(move || waker.cancel());
///
/// // Returns true (cancelled) well before the full second elapses.
/// assert!(token.wait_timeout(Duration::from_secs(1)));
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the stop signal, waking any thread sleeping on this token.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock().expect("cancel lock poisoned");
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock().expect("cancel lock poisoned")
    }

    /// Sleep for `timeout` or until cancelled, whichever comes first.
    ///
    /// Returns true if the token was cancelled (before or during the wait).
    /// A `timeout` too large to represent as a deadline is treated as no
    /// deadline at all: only cancellation ends the wait.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now().checked_add(timeout);
        let mut cancelled = self.inner.cancelled.lock().expect("cancel lock poisoned");
        loop {
            if *cancelled {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    // Condvar wakeups can be spurious; loop on the remaining
                    // time.
                    let (guard, _) = self
                        .inner
                        .wake
                        .wait_timeout(cancelled, deadline - now)
                        .expect("cancel lock poisoned");
                    cancelled = guard;
                }
                None => {
                    cancelled = self.inner.wake.wait(cancelled).expect("cancel lock poisoned");
                }
            }
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
