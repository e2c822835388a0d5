//! Recording backend transport for tests and the offline simulator.

use crate::error::{Result, TransportError};
use crate::payload::{AuditPayload, ErrorLogPayload, StatusPayload};
use crate::transport::BackendTransport;
use keybox_core::CodeTable;
use keybox_core::constants::STATUS_OK;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    codes: CodeTable,
    codes_status: Option<u16>,
    unreachable: bool,
    latency: Duration,

    statuses: Vec<StatusPayload>,
    audits: Vec<AuditPayload>,
    errors: Vec<ErrorLogPayload>,
    code_fetches: usize,
}

/// In-memory [`BackendTransport`].
///
/// Clones share state, so a test can keep one clone for inspection while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport serving `codes`.
    pub fn with_codes(codes: CodeTable) -> Self {
        let transport = Self::new();
        transport.set_codes(codes);
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_codes(&self, codes: CodeTable) {
        self.lock().codes = codes;
    }

    /// Answer code fetches with this HTTP status instead of success.
    pub fn set_codes_status(&self, status: u16) {
        self.lock().codes_status = Some(status);
    }

    /// Fail every call as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Delay every answer; calls whose timeout is shorter fail with a timeout.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn statuses(&self) -> Vec<StatusPayload> {
        self.lock().statuses.clone()
    }

    pub fn audits(&self) -> Vec<AuditPayload> {
        self.lock().audits.clone()
    }

    pub fn errors(&self) -> Vec<ErrorLogPayload> {
        self.lock().errors.clone()
    }

    pub fn code_fetches(&self) -> usize {
        self.lock().code_fetches
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        let state = self.lock();
        state.statuses.len() + state.audits.len() + state.errors.len() + state.code_fetches
    }

    async fn round_trip(&self, timeout: Duration) -> Result<()> {
        let (latency, unreachable) = {
            let state = self.lock();
            (state.latency, state.unreachable)
        };

        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::timeout(timeout));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if unreachable {
            return Err(TransportError::Request("network unreachable".to_string()));
        }
        Ok(())
    }
}

impl BackendTransport for MockTransport {
    async fn put_status(&self, status: &StatusPayload, timeout: Duration) -> Result<u16> {
        self.lock().statuses.push(status.clone());
        self.round_trip(timeout).await?;
        Ok(STATUS_OK)
    }

    async fn get_codes(&self, timeout: Duration) -> Result<(u16, Option<CodeTable>)> {
        self.lock().code_fetches += 1;
        self.round_trip(timeout).await?;

        let state = self.lock();
        match state.codes_status {
            Some(status) if status != STATUS_OK => Ok((status, None)),
            _ => Ok((STATUS_OK, Some(state.codes.clone()))),
        }
    }

    async fn post_audit(&self, event: &AuditPayload, timeout: Duration) -> Result<u16> {
        self.lock().audits.push(event.clone());
        self.round_trip(timeout).await?;
        Ok(STATUS_OK)
    }

    async fn post_error(&self, record: &ErrorLogPayload, timeout: Duration) -> Result<u16> {
        self.lock().errors.push(record.clone());
        self.round_trip(timeout).await?;
        Ok(STATUS_OK)
    }
}
