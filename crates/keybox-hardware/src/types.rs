//! Common types shared across hardware device implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of slot positions on one row board.
pub const PINS_PER_ROW: u8 = 8;

/// One physical lock/sensor pair on a row board.
///
/// Slots are addressed by the row (port expander) they sit on and their pin
/// pair on that board. The 1-based `position` numbers slots across rows in
/// reading order and is what configuration refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId {
    pub row: u8,
    pub pin: u8,
}

impl SlotId {
    /// Create a slot from its row and pin.
    pub fn new(row: u8, pin: u8) -> Self {
        debug_assert!(pin < PINS_PER_ROW, "pin must be 0-7");
        Self { row, pin }
    }

    /// Create a slot from its 1-based position.
    ///
    /// Returns `None` for position 0.
    pub fn from_position(position: usize) -> Option<Self> {
        let zero_based = position.checked_sub(1)?;
        let per_row = usize::from(PINS_PER_ROW);
        let row = u8::try_from(zero_based / per_row).ok()?;
        Some(Self::new(row, (zero_based % per_row) as u8))
    }

    /// 1-based slot position: `row * 8 + pin + 1`.
    pub fn position(&self) -> usize {
        usize::from(self.row) * usize::from(PINS_PER_ROW) + usize::from(self.pin) + 1
    }

    /// Index of this slot's LED on the compartment light strip.
    pub fn led_index(&self) -> usize {
        self.position() - 1
    }

    /// Expander pin wired to the door sensor.
    pub fn sensor_pin(&self) -> u8 {
        self.pin * 2
    }

    /// Expander pin wired to the lock actuator.
    pub fn lock_pin(&self) -> u8 {
        self.pin * 2 + 1
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {} (row {}, pin {})", self.position(), self.row, self.pin)
    }
}

/// LED colors for visual feedback on the front panel and compartment lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum LedColor {
    /// LED off.
    Off,

    /// Dim white idle glow.
    Idle,

    /// Green, access granted.
    Granted,

    /// Red, access rejected or alarm.
    Rejected,

    /// Neutral white marking the compartment being served.
    Highlight,

    /// Custom RGB color (red, green, blue).
    Custom(u8, u8, u8),
}

impl LedColor {
    /// Create a custom RGB LED color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Custom(r, g, b)
    }

    /// Get the RGB components of the LED color.
    pub fn as_rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Idle => (30, 30, 30),
            Self::Granted => (15, 50, 0),
            Self::Rejected => (90, 0, 0),
            Self::Highlight => (50, 50, 50),
            Self::Custom(r, g, b) => (*r, *g, *b),
        }
    }
}

/// Status icons shown along the top of the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indicator {
    /// The backend did not answer the last keepalive.
    BackendUnreachable,

    /// Battery voltage below the low-battery threshold.
    LowBattery,

    /// Mains supply not detected.
    NoSupply,

    /// A peripheral or compartment board is missing.
    Maintenance,
}

/// Answer icons shown next to the content question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerIcons {
    Hidden,

    /// Content unknown: "returned (confirm) or taken (cancel)?".
    ReturnedOrTaken,

    /// Content known: "no (cancel) / yes (confirm)".
    NoYes,
}
