//! Access control and device state engine for the keybox locker.
//!
//! Ties the hardware and network layers together into the device's
//! behavior: validating entered codes, actuating locks with bounded retries,
//! the door-close and content dialogs, backend synchronization and the
//! supervisory loop that runs all of it.
//!
//! ```text
//!                 ┌──────────────────── Supervisor ────────────────────┐
//! keypad ──> KeyEdges ──> CodeValidator ──> LockActuator ──> ContentDialog
//!                 │            │                 │                  │
//!                 │       RemoteSync         LockBank       CompartmentRegistry
//!                 └── periodic tiers: watchdog, sensors, keepalive, commands
//! ```
//!
//! Everything runs on one task. Waits are bounded ([`wait::BoundedWait`]) and
//! measured on tokio's clock, so the whole engine can be driven in tests with
//! a paused clock and the mocks from `keybox-hardware` and `keybox-network`.

pub mod actuator;
pub mod config;
pub mod confirmation;
pub mod context;
pub mod input;
pub mod log_sinks;
pub mod messages;
pub mod registry;
pub mod supervisor;
pub mod sync;
pub mod validator;
pub mod wait;

pub use actuator::{ActuationPhase, ActuationPolicy, ActuationReport, CloseOutcome, LockActuator};
pub use config::KeyboxConfig;
pub use confirmation::{ContentAnswer, ContentDialog};
pub use context::{DeviceContext, DeviceFlags, DeviceIdentity, FixedClock, SystemClock, WallClock};
pub use log_sinks::{DisplayLog, ErrorQueue, ErrorRecord, display_log, error_forwarding};
pub use messages::Prompt;
pub use registry::{Compartment, CompartmentRegistry};
pub use supervisor::{NoticeTiming, RestartReason, Sensors, Supervisor};
pub use sync::{RemoteSync, SyncOutcome};
pub use validator::{CodeSource, CodeValidator};
