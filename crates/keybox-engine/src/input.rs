//! Edge-triggered keypad reading.

use keybox_hardware::{KeypadDevice, KeypadInput};
use tracing::debug;

/// Turns the keypad's "currently held" reading into key presses.
///
/// A press is reported once when the held key changes to a new key. Holding
/// a key, or releasing it, reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyEdges {
    last: Option<KeypadInput>,
}

impl KeyEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from whatever is held right now, so a key still held from an
    /// earlier step does not count as a fresh press.
    pub async fn primed<K: KeypadDevice>(keypad: &mut K) -> Self {
        Self {
            last: read(keypad).await,
        }
    }

    /// Poll once; returns the key if it was just pressed.
    pub async fn poll<K: KeypadDevice>(&mut self, keypad: &mut K) -> Option<KeypadInput> {
        let current = read(keypad).await;
        if current == self.last {
            return None;
        }
        self.last = current;
        current
    }
}

async fn read<K: KeypadDevice>(keypad: &mut K) -> Option<KeypadInput> {
    match keypad.read_key().await {
        Ok(key) => key,
        Err(e) => {
            debug!(error = %e, "Keypad read failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybox_hardware::mock::MockKeypad;

    #[tokio::test]
    async fn test_press_reported_once() {
        let (mut keypad, handle) = MockKeypad::new();
        let mut edges = KeyEdges::new();

        handle.press(KeypadInput::Digit(4)).await.unwrap();
        assert_eq!(edges.poll(&mut keypad).await, Some(KeypadInput::Digit(4)));
        assert_eq!(edges.poll(&mut keypad).await, None);

        handle.release().await.unwrap();
        assert_eq!(edges.poll(&mut keypad).await, None);

        handle.press(KeypadInput::Digit(4)).await.unwrap();
        assert_eq!(edges.poll(&mut keypad).await, Some(KeypadInput::Digit(4)));
    }

    #[tokio::test]
    async fn test_primed_ignores_held_key() {
        let (mut keypad, handle) = MockKeypad::new();
        handle.press(KeypadInput::Confirm).await.unwrap();

        let mut edges = KeyEdges::primed(&mut keypad).await;
        assert_eq!(edges.poll(&mut keypad).await, None);

        handle.press(KeypadInput::Cancel).await.unwrap();
        assert_eq!(edges.poll(&mut keypad).await, Some(KeypadInput::Cancel));
    }
}
