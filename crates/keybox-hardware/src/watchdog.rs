//! Software watchdog for hosts without a hardware timer.
//!
//! A background thread checks the time since the last feed once per tick and
//! fires the expiry action when the timeout has passed. The check runs on a
//! plain OS thread so a stalled async runtime cannot also stall the watchdog.

use crate::traits::Watchdog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::error;

/// Watchdog backed by a monitor thread.
///
/// Dropping the watchdog stops the monitor without firing.
#[derive(Debug)]
pub struct SoftwareWatchdog {
    last_feed: Arc<Mutex<Instant>>,
    stopped: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl SoftwareWatchdog {
    /// Start a watchdog that aborts the process when it is not fed within
    /// `timeout`.
    pub fn start(timeout: Duration) -> std::io::Result<Self> {
        Self::with_action(timeout, move || {
            error!(timeout_secs = timeout.as_secs(), "Watchdog expired, aborting");
            std::process::abort();
        })
    }

    /// Start a watchdog that runs `on_expire` once when it is not fed within
    /// `timeout`, then stops monitoring.
    pub fn with_action<F>(timeout: Duration, on_expire: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let last_feed = Arc::new(Mutex::new(Instant::now()));
        let stopped = Arc::new(AtomicBool::new(false));
        let tick = (timeout / 10).max(Duration::from_millis(10));

        let monitor = {
            let last_feed = Arc::clone(&last_feed);
            let stopped = Arc::clone(&stopped);
            thread::Builder::new()
                .name("watchdog".to_string())
                .spawn(move || {
                    while !stopped.load(Ordering::Acquire) {
                        thread::sleep(tick);
                        let elapsed = last_feed
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .elapsed();
                        if elapsed >= timeout && !stopped.load(Ordering::Acquire) {
                            on_expire();
                            return;
                        }
                    }
                })?
        };

        Ok(Self {
            last_feed,
            stopped,
            monitor: Some(monitor),
        })
    }
}

impl Watchdog for SoftwareWatchdog {
    fn feed(&self) {
        *self
            .last_feed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }
}

impl Drop for SoftwareWatchdog {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.join();
        }
    }
}
