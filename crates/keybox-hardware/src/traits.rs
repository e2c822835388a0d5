//! Hardware device trait definitions.
//!
//! These traits are the contract between the locker engine and its
//! peripherals. Bus-level devices (keypad, lock bank) use native `async fn`
//! methods (Rust 1.90 + Edition 2024 RPITIT) and are consumed through generic
//! parameters. Simple local sensors and the front panel are synchronous and
//! object-safe so optional ones can be held as `Option<Box<dyn ...>>`.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::types::{AnswerIcons, Indicator, LedColor, SlotId};

/// Input from the touch keypad.
///
/// The keypad has ten digits, a confirm key and a cancel key. Cancel clears
/// the code buffer in normal operation and aborts the close-wait dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypadInput {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Confirm key (✓).
    Confirm,

    /// Cancel / clear key (x).
    Cancel,
}

impl KeypadInput {
    /// Create a digit input.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use keybox_hardware::traits::KeypadInput;
    ///
    /// let input = KeypadInput::digit(5).unwrap();
    /// assert_eq!(input.as_digit(), Some(5));
    ///
    /// assert!(KeypadInput::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(crate::error::HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {}",
                d
            )));
        }
        Ok(Self::Digit(d))
    }

    /// Map a keypad legend character to an input.
    ///
    /// Digits map to themselves, `'x'` to cancel and `'✓'`/`'#'` to confirm.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => Some(Self::Digit(c as u8 - b'0')),
            'x' | 'X' | '*' => Some(Self::Cancel),
            '✓' | '#' => Some(Self::Confirm),
            _ => None,
        }
    }

    /// Check if this input is a digit.
    pub fn is_digit(&self) -> bool {
        matches!(self, Self::Digit(_))
    }

    /// Get the digit value if this is a digit input.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }

    /// Digit as the character appended to the code buffer.
    pub fn as_char(&self) -> Option<char> {
        self.as_digit().map(|d| char::from(b'0' + d))
    }
}

/// Keypad device abstraction.
///
/// The keypad is polled once per supervisory loop iteration. `read_key`
/// reports the key currently held (debounced), or `None`. Edge detection is
/// the caller's job: holding a key returns the same input on every poll.
pub trait KeypadDevice: Send {
    /// Read the currently held key.
    ///
    /// # Errors
    ///
    /// Returns an error if the touch controller cannot be read.
    async fn read_key(&mut self) -> Result<Option<KeypadInput>>;

    /// Play the short haptic click acknowledging a key press.
    async fn click(&mut self) -> Result<()>;
}

/// The bank of lock actuators and door sensors across all detected rows.
///
/// A slot's lock stays asserted until explicitly released; callers are
/// responsible for pairing every `set_lock(slot, true)` with a release.
pub trait LockBank: Send {
    /// Number of row boards detected at startup.
    fn detected_rows(&self) -> usize;

    /// Assert (`true`) or release (`false`) the lock actuator of one slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is not wired or the bus write fails.
    async fn set_lock(&mut self, slot: SlotId, engaged: bool) -> Result<()>;

    /// Read the door sensor of one slot; `true` means the door is open.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is not wired or the bus read fails.
    async fn is_door_open(&mut self, slot: SlotId) -> Result<bool>;
}

/// Display, status LEDs and compartment light strip.
///
/// Rendering is local and cannot meaningfully fail, so these calls are
/// infallible.
pub trait FrontPanel: Send {
    /// Replace the status text below the code field.
    fn show_status(&mut self, text: &str);

    /// Show the code typed so far.
    fn show_code(&mut self, code: &str);

    /// Show the startup log lines, oldest first.
    fn show_log(&mut self, lines: &[String]);

    /// Show or hide the answer icons of the content question.
    fn show_answer_icons(&mut self, icons: AnswerIcons);

    /// Show or hide one status icon.
    fn set_indicator(&mut self, indicator: Indicator, active: bool);

    /// Set backlight and LED brightness, `0.0..=1.0`.
    fn set_brightness(&mut self, level: f32);

    /// Fill the internal status LEDs with one color.
    fn set_status_light(&mut self, color: LedColor);

    /// Set the given compartment LEDs to one color.
    fn set_compartment_lights(&mut self, leds: &[usize], color: LedColor);
}

/// Ambient light sensor used to dim the display at night.
pub trait LightSensor: Send {
    /// Visible light level (visible+IR minus IR).
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor cannot be read.
    fn visible_light(&mut self) -> Result<f32>;
}

/// Battery fuel gauge.
pub trait BatteryMonitor: Send {
    /// Cell voltage in volts.
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge cannot be read.
    fn cell_voltage(&mut self) -> Result<f32>;

    /// State of charge in percent.
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge cannot be read.
    fn cell_percent(&mut self) -> Result<f32>;
}

/// Mains supply detection input.
pub trait SupplyMonitor: Send {
    /// Returns `true` while the external supply is present.
    fn supply_present(&mut self) -> bool;
}

/// Accelerometer used by the tamper alarm.
pub trait MotionSensor: Send {
    /// Acceleration along x, y and z in m/s².
    ///
    /// # Errors
    ///
    /// Returns an error if the sensor cannot be read.
    fn acceleration(&mut self) -> Result<(f32, f32, f32)>;
}

/// Process-wide liveness timer.
///
/// Must be fed at least once per timeout window or the device restarts.
pub trait Watchdog: Send + Sync {
    fn feed(&self);
}
