use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot signal raised when a recording has been finalized.
///
/// `deactivate` blocks on it. Waiting from the thread that is delivering the
/// finalize notifications returns immediately instead of deadlocking.
#[derive(Debug, Default)]
pub struct FinalizeSignal {
    done: Mutex<bool>,
    cond: Condvar,
    owner: Mutex<Option<ThreadId>>,
}

impl FinalizeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the calling thread as the one delivering the finalize result.
    pub fn enter(&self) {
        *self.owner.lock() = Some(thread::current().id());
    }

    pub fn notify(&self) {
        let mut done = self.done.lock();
        *done = true;
        self.cond.notify_all();
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock()
    }

    fn is_owner(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Block until notified.
    pub fn wait(&self) {
        if self.is_owner() {
            return;
        }
        let mut done = self.done.lock();
        while !*done {
            self.cond.wait(&mut done);
        }
    }

    /// Block until notified or `timeout` elapses. Returns whether it was notified.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_owner() {
            return self.is_done();
        }
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cond.wait_until(&mut done, deadline).timed_out() {
                return *done;
            }
        }
        true
    }
}
