use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::error::CaptureError;

/// Periodic `duration-timer` thread driving duration notifications.
///
/// `tick` runs once per interval until it returns `false` or the timer is
/// stopped.
pub(crate) struct DurationTimer {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DurationTimer {
    pub(crate) fn start<F>(interval: Duration, tick: F) -> Result<Self, CaptureError>
    where
        F: Fn() -> bool + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("duration-timer".into())
            .spawn(move || {
                while flag.load(Ordering::SeqCst) {
                    thread::park_timeout(interval);
                    if !flag.load(Ordering::SeqCst) || !tick() {
                        break;
                    }
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn duration timer: {}", e)))?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it, unless called from the timer thread.
    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        handle.thread().unpark();
        let _ = handle.join();
    }
}

impl Drop for DurationTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
