//! Mock keypad implementation for testing and simulation.
//!
//! The real touch keypad is level-triggered: polling it reports whichever key
//! is currently held. This mock reproduces that by replaying press and release
//! events, applying at most one event per poll, so a tap is visible for
//! exactly one poll and a held key repeats until released.

use crate::{
    HardwareError, Result,
    traits::{KeypadDevice, KeypadInput},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Capacity of the simulated key event queue.
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyEvent {
    Press(KeypadInput),
    Release,
}

/// Mock keypad device for testing and simulation.
///
/// # Examples
///
/// ```
/// use keybox_hardware::mock::MockKeypad;
/// use keybox_hardware::traits::{KeypadDevice, KeypadInput};
///
/// #[tokio::main]
/// async fn main() -> keybox_hardware::Result<()> {
///     let (mut keypad, handle) = MockKeypad::new();
///
///     handle.tap(KeypadInput::Digit(1)).await?;
///
///     assert_eq!(keypad.read_key().await?, Some(KeypadInput::Digit(1)));
///     assert_eq!(keypad.read_key().await?, None);
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    events: mpsc::Receiver<KeyEvent>,
    held: Option<KeypadInput>,
    clicks: Arc<AtomicUsize>,
}

impl MockKeypad {
    /// Create a new mock keypad and the handle that drives it.
    pub fn new() -> (Self, MockKeypadHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let clicks = Arc::new(AtomicUsize::new(0));

        let keypad = Self {
            events: rx,
            held: None,
            clicks: Arc::clone(&clicks),
        };

        (keypad, MockKeypadHandle { events: tx, clicks })
    }
}

impl KeypadDevice for MockKeypad {
    async fn read_key(&mut self) -> Result<Option<KeypadInput>> {
        match self.events.try_recv() {
            Ok(KeyEvent::Press(input)) => self.held = Some(input),
            Ok(KeyEvent::Release) => self.held = None,
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => {
                // A dropped handle behaves like nobody touching the keypad.
                self.held = None;
            }
        }
        Ok(self.held)
    }

    async fn click(&mut self) -> Result<()> {
        self.clicks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Handle for driving a [`MockKeypad`].
///
/// Cloneable, so a simulation task and a test body can both type on it.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    events: mpsc::Sender<KeyEvent>,
    clicks: Arc<AtomicUsize>,
}

impl MockKeypadHandle {
    async fn send(&self, event: KeyEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| HardwareError::disconnected("Keypad event channel closed"))
    }

    /// Start holding a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn press(&self, input: KeypadInput) -> Result<()> {
        self.send(KeyEvent::Press(input)).await
    }

    /// Release whatever key is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn release(&self) -> Result<()> {
        self.send(KeyEvent::Release).await
    }

    /// Press and release one key.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn tap(&self, input: KeypadInput) -> Result<()> {
        self.press(input).await?;
        self.release().await
    }

    /// Tap each character of `keys`, mapped with [`KeypadInput::from_char`].
    ///
    /// Unmapped characters are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn type_keys(&self, keys: &str) -> Result<()> {
        for input in keys.chars().filter_map(KeypadInput::from_char) {
            self.tap(input).await?;
        }
        Ok(())
    }

    /// Type a code followed by the confirm key.
    ///
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn enter_code(&self, code: &str) -> Result<()> {
        self.type_keys(code).await?;
        self.tap(KeypadInput::Confirm).await
    }

    /// Number of haptic clicks played so far.
    pub fn clicks(&self) -> usize {
        self.clicks.load(Ordering::Relaxed)
    }
}
