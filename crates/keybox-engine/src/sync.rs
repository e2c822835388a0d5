//! Remote synchronization.
//!
//! [`RemoteSync`] wraps a [`BackendTransport`] with the device's policy:
//! every call is bounded by the configured timeout, and no failure ever
//! leaves this module as an error. Keepalive, code fetch and audit failures
//! are logged; forwarded error-log failures are only counted.

use crate::log_sinks::{ErrorQueue, ErrorRecord};
use crate::validator::CodeSource;
use chrono::{DateTime, Local};
use keybox_core::constants::STATUS_OK;
use keybox_core::{AuditEvent, CodeTable, DeviceStatus};
use keybox_network::{
    AuditPayload, BackendTransport, ErrorLogPayload, StatusPayload, TransportError,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error};

/// Result of one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The backend answered with success.
    Delivered(u16),
    /// The backend answered with another status.
    Rejected(u16),
    /// No answer: timeout, connection or decode failure.
    Failed(String),
}

impl SyncOutcome {
    fn from_status(status: u16) -> Self {
        if status == STATUS_OK {
            SyncOutcome::Delivered(status)
        } else {
            SyncOutcome::Rejected(status)
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, SyncOutcome::Delivered(_))
    }

    /// HTTP status, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncOutcome::Delivered(status) | SyncOutcome::Rejected(status) => Some(*status),
            SyncOutcome::Failed(_) => None,
        }
    }
}

/// Run one transport call, giving up after `limit` whether or not the
/// transport honors its own timeout.
async fn bounded<R>(
    limit: Duration,
    call: impl Future<Output = keybox_network::Result<R>>,
) -> keybox_network::Result<R> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(TransportError::timeout(limit)))
}

/// Keepalive, code fetch, audit and error-log forwarding.
pub struct RemoteSync<T: BackendTransport> {
    transport: T,
    timeout: Duration,
    errors: Option<ErrorQueue>,
    reachable: AtomicBool,
    failed_error_posts: AtomicU64,
}

impl<T: BackendTransport> RemoteSync<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            errors: None,
            reachable: AtomicBool::new(true),
            failed_error_posts: AtomicU64::new(0),
        }
    }

    /// Forward records from this queue in [`RemoteSync::drain_error_queue`].
    pub fn with_error_queue(mut self, queue: ErrorQueue) -> Self {
        self.errors = Some(queue);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `false` if the last call got no answer from the backend.
    pub fn backend_reachable(&self) -> bool {
        self.reachable.load(Ordering::Relaxed)
    }

    /// Error records that could not be delivered, including those dropped
    /// by a full queue.
    pub fn lost_error_records(&self) -> u64 {
        let dropped = self.errors.as_ref().map_or(0, ErrorQueue::dropped);
        dropped + self.failed_error_posts.load(Ordering::Relaxed)
    }

    fn note<R, E>(&self, result: &Result<R, E>) {
        self.reachable.store(result.is_ok(), Ordering::Relaxed);
    }

    /// Publish the keepalive status.
    pub async fn push_status(&self, status: &DeviceStatus, now: &DateTime<Local>) -> SyncOutcome {
        let payload = StatusPayload::new(status, now);
        let result =
            bounded(self.timeout, self.transport.put_status(&payload, self.timeout)).await;
        self.note(&result);

        match result {
            Ok(code) => {
                let outcome = SyncOutcome::from_status(code);
                if outcome.is_delivered() {
                    debug!(status = code, "Keepalive delivered");
                } else {
                    error!(status = code, "Keepalive rejected by backend");
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "Keepalive failed");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Record one code entry.
    pub async fn push_audit(&self, event: &AuditEvent) -> SyncOutcome {
        let payload = AuditPayload::from(event);
        let result =
            bounded(self.timeout, self.transport.post_audit(&payload, self.timeout)).await;
        self.note(&result);

        match result {
            Ok(code) => {
                let outcome = SyncOutcome::from_status(code);
                if !outcome.is_delivered() {
                    error!(status = code, "Audit record rejected by backend");
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "Failed to send audit record");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    /// Forward one error record.
    ///
    /// Failures are counted, never logged: this runs on behalf of the
    /// logger itself.
    pub async fn push_error_log(&self, record: &ErrorRecord, uptime: Duration) -> bool {
        self.post_error_within(record, uptime, self.timeout).await
    }

    async fn post_error_within(
        &self,
        record: &ErrorRecord,
        uptime: Duration,
        timeout: Duration,
    ) -> bool {
        let payload =
            ErrorLogPayload::new(&record.timestamp, uptime, &record.level, &record.message);
        let delivered = matches!(
            bounded(timeout, self.transport.post_error(&payload, timeout)).await,
            Ok(code) if code == STATUS_OK
        );
        if !delivered {
            self.failed_error_posts.fetch_add(1, Ordering::Relaxed);
        }
        delivered
    }

    /// Forward queued error records.
    ///
    /// Spends at most one call timeout in total and stops at the first
    /// failure, leaving the rest queued for the next drain. Returns the
    /// number of records delivered.
    pub async fn drain_error_queue(&mut self, uptime: Duration) -> usize {
        let deadline = Instant::now() + self.timeout;
        let mut delivered = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let Some(record) = self.errors.as_mut().and_then(ErrorQueue::try_next) else {
                break;
            };
            if !self.post_error_within(&record, uptime, remaining).await {
                break;
            }
            delivered += 1;
        }

        delivered
    }
}

impl<T: BackendTransport> CodeSource for RemoteSync<T> {
    async fn fetch_codes(&self) -> Result<CodeTable, String> {
        let result =
            bounded(self.timeout, self.transport.get_codes(self.timeout)).await;
        self.note(&result);

        match result {
            Ok((STATUS_OK, Some(table))) => Ok(table),
            Ok((status, _)) => {
                error!(status, "Error response from backend when getting codes");
                Err(format!("backend answered {status}"))
            }
            Err(e) => {
                error!(error = %e, "Failed to get codes");
                Err(e.to_string())
            }
        }
    }
}
