//! Cooperative cancellation
//!
//! Every long-running loop receives a `CancelToken` and checks it at each
//! blocking boundary. Sleeping on the token wakes up immediately when the
//! token is cancelled.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Inner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// Cloneable cancellation flag
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }
    
    /// Request cancellation and wake every sleeper
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        *cancelled = true;
        self.inner.condvar.notify_all();
    }
    
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }
    
    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `true` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self.inner.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
