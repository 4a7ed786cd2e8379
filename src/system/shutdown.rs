//! Cooperative cancellation of the estimation loop.
//!
//! The loop sleeps between ticks with [`ShutdownSignal::wait`], which returns
//! early as soon as [`ShutdownHandle::request`] is called. In-flight inference
//! is never interrupted; the request is observed between ticks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};

/// Create a connected handle / signal pair.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let requested = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = bounded(1);
    (
        ShutdownHandle {
            requested: Arc::clone(&requested),
            wake: wake_tx,
        },
        ShutdownSignal {
            requested,
            wake: wake_rx,
        },
    )
}

/// Requests shutdown. Cheap to clone; safe to call from a signal handler thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // Full channel means a wake-up is already pending
        let _ = self.wake.try_send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Observes shutdown requests from the loop side.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    requested: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Sleep for up to `timeout`. Returns true if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_requested() {
            return true;
        }
        match self.wake.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.is_requested(),
            Err(RecvTimeoutError::Disconnected) => {
                // Every handle is gone, nobody can wake us any more
                thread::sleep(timeout);
                self.is_requested()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_wait_times_out_without_request() {
        let (_handle, signal) = shutdown_channel();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_request_wakes_waiter_early() {
        let (handle, signal) = shutdown_channel();
        let waiter = thread::spawn(move || {
            let start = Instant::now();
            let stopped = signal.wait(Duration::from_secs(10));
            (stopped, start.elapsed())
        });

        thread::sleep(Duration::from_millis(20));
        handle.request();
        let (stopped, elapsed) = waiter.join().unwrap();
        assert!(stopped);
        assert!(elapsed < Duration::from_secs(5));
        assert!(handle.is_requested());
    }

    #[test]
    fn test_request_before_wait_is_seen() {
        let (handle, signal) = shutdown_channel();
        handle.request();
        handle.request();
        assert!(signal.is_requested());
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(signal.wait(Duration::from_millis(1)));
    }

    #[test]
    fn test_dropped_handle_does_not_spin() {
        let (handle, signal) = shutdown_channel();
        drop(handle);
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
