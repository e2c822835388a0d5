//! Network layer for the keybox controller.
//!
//! Two independent paths reach the backend:
//!
//! - **Request/response** over HTTPS ([`HttpTransport`]): keepalive status,
//!   code table fetches, audit records and forwarded error logs, each bounded
//!   by a per-call timeout.
//! - **Inbound commands** over a line-framed TCP connection
//!   ([`CommandChannel`]), polled on a fixed cadence.
//!
//! Both sit behind traits ([`BackendTransport`], [`CommandSource`]) so the
//! engine can be driven by [`MockTransport`] and [`QueuedCommands`] in tests.
//!
//! ```text
//! Supervisor ──> RemoteSync ──> BackendTransport ──(HTTPS)──> backend
//!     │
//!     └────────> CommandSource ──(TCP, lines)──> command broker
//! ```

mod command_channel;
mod error;
mod http;
mod mock;
pub mod payload;
mod transport;

pub use command_channel::{CommandChannel, CommandChannelConfig, CommandSource, QueuedCommands};
pub use error::{Result, TransportError};
pub use http::{HttpTransport, HttpTransportConfig};
pub use mock::MockTransport;
pub use payload::{AuditPayload, ErrorLogPayload, StatusPayload};
pub use transport::BackendTransport;
