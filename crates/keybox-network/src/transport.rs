//! Backend transport abstraction.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::payload::{AuditPayload, ErrorLogPayload, StatusPayload};
use keybox_core::CodeTable;
use std::time::Duration;

/// Request/response access to the backend.
///
/// Every call carries its own timeout and must return within it, successful
/// or not. A non-success HTTP status is not an error: it is returned as the
/// status code and interpreted by the caller.
pub trait BackendTransport: Send + Sync {
    /// Publish the keepalive status.
    async fn put_status(&self, status: &StatusPayload, timeout: Duration) -> Result<u16>;

    /// Fetch the current code table.
    ///
    /// The table is only present when the backend answered with success.
    async fn get_codes(&self, timeout: Duration) -> Result<(u16, Option<CodeTable>)>;

    /// Record one code entry.
    async fn post_audit(&self, event: &AuditPayload, timeout: Duration) -> Result<u16>;

    /// Forward one error-level log record.
    async fn post_error(&self, record: &ErrorLogPayload, timeout: Duration) -> Result<u16>;
}
