//! Manual-reset abort event
//!
//! Once signaled the event stays signaled, so every later wait returns
//! immediately. This is the generator's only blocking point and also how it
//! is told to stop.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Outcome of [`AbortEvent::timed_wait`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    TimedOut,
}

/// Level-triggered cancellation flag with an interruptible timed wait
#[derive(Clone, Debug, Default)]
pub struct AbortEvent {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl AbortEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter
    pub fn signal(&self) {
        let (lock, cvar) = &*self.inner;
        let mut signaled = lock.lock().unwrap_or_else(|e| {
            log::warn!("Abort event mutex poisoned; continuing");
            e.into_inner()
        });
        *signaled = true;
        cvar.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the event is signaled or `timeout` elapses.
    ///
    /// Spurious wakeups are absorbed; the deadline is fixed at entry.
    pub fn timed_wait(&self, timeout: Duration) -> WaitResult {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut signaled = lock.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            if *signaled {
                return WaitResult::Signaled;
            }
            let now = Instant::now();
            if now >= deadline {
                return WaitResult::TimedOut;
            }
            signaled = match cvar.wait_timeout(signaled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
    }
}
