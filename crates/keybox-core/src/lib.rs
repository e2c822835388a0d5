//! Core domain types for the keybox locker controller.
//!
//! Everything in here is plain data: compartment identities, access codes,
//! lookup outcomes, audit and keepalive records, and the named timing
//! constants that make up the device's retry and timeout policy.

pub mod command;
pub mod constants;
pub mod error;
pub mod types;

pub use command::{CommandTarget, RemoteCommand};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
