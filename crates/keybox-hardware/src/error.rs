//! Error types for hardware operations.
//!
//! Physical I/O on the locker is expected to be reliable once a device has
//! been detected at boot. These errors exist so drivers can report the rare
//! bus fault; callers log them and carry on with the conservative outcome.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Slot position is not wired on the detected hardware.
    #[error("Unknown slot: {slot}")]
    UnknownSlot { slot: String },

    /// Bus communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new unknown slot error.
    pub fn unknown_slot(slot: impl ToString) -> Self {
        Self::UnknownSlot {
            slot: slot.to_string(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("MCP23017@0x20");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: MCP23017@0x20");
    }

    #[test]
    fn test_communication_error() {
        let error = HardwareError::communication("I2C NACK");
        assert_eq!(error.to_string(), "Communication error: I2C NACK");
    }

    #[test]
    fn test_invalid_data_error() {
        let error = HardwareError::invalid_data("Digit must be 0-9, got 12");
        assert!(matches!(error, HardwareError::InvalidData { .. }));
    }
}
