//! Mock device implementations for testing and simulation.
//!
//! Every mock comes with a cloneable handle that drives or inspects it from
//! the outside, so a test can keep the handle while the engine owns the
//! device.

pub mod keypad;
pub mod locks;
pub mod panel;
pub mod sensors;

pub use keypad::{MockKeypad, MockKeypadHandle};
pub use locks::{MockLockBank, MockLockBankHandle};
pub use panel::{MockPanel, MockPanelHandle};
pub use sensors::{
    MockAmbient, MockBattery, MockLightSensor, MockMotionSensor, MockSupply, MockWatchdog,
};
