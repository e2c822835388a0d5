//! Hardware abstraction layer for the keybox locker controller.
//!
//! This crate defines the traits the engine uses to reach the physical
//! locker, plus mock implementations for tests and the desktop simulator.
//!
//! # Devices
//!
//! | Trait | Hardware |
//! |-------|----------|
//! | [`KeypadDevice`] | Capacitive touch keypad with haptic feedback |
//! | [`LockBank`] | Port expander rows driving lock solenoids and reading door sensors |
//! | [`FrontPanel`] | Display, status LEDs and compartment light strip |
//! | [`LightSensor`], [`BatteryMonitor`], [`SupplyMonitor`], [`MotionSensor`] | Optional ambient sensors |
//! | [`Watchdog`] | Liveness timer that restarts the device when starved |
//!
//! Bus devices are async and consumed through generics:
//!
//! ```no_run
//! use keybox_hardware::{LockBank, SlotId, Result};
//!
//! async fn door_open<L: LockBank>(locks: &mut L, slots: &[SlotId]) -> Result<bool> {
//!     // A compartment with several doors counts as closed if any sensor says so.
//!     for slot in slots {
//!         if !locks.is_door_open(*slot).await? {
//!             return Ok(false);
//!         }
//!     }
//!     Ok(true)
//! }
//! ```
//!
//! Panel and sensors are synchronous and object-safe; optional sensors are
//! held as `Option<Box<dyn LightSensor>>` and friends.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;
pub mod watchdog;

pub use error::{HardwareError, Result};
pub use traits::{
    BatteryMonitor, FrontPanel, KeypadDevice, KeypadInput, LightSensor, LockBank, MotionSensor,
    SupplyMonitor, Watchdog,
};
pub use types::{AnswerIcons, Indicator, LedColor, SlotId};
pub use watchdog::SoftwareWatchdog;
