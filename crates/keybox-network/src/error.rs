use thiserror::Error;

/// Errors from the backend transport and the command channel.
///
/// None of these are fatal to the device; callers log them and continue
/// with the next cycle.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The call did not finish within its timeout.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// Response body was not what the backend is expected to return.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The command channel has no open connection.
    #[error("Not connected")]
    NotConnected,

    /// The peer closed the command channel.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout(after.as_millis() as u64)
    }

    /// Returns `true` for timeouts.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_in_millis() {
        let error = TransportError::timeout(Duration::from_secs(5));
        assert!(error.is_timeout());
        assert_eq!(error.to_string(), "Timeout after 5000ms");
    }

    #[test]
    fn test_request_error_is_not_timeout() {
        let error = TransportError::Request("dns".to_string());
        assert!(!error.is_timeout());
    }
}
