//! Content confirmation dialog.
//!
//! After a door has been closed, the user is asked whether they took out or
//! put in the content. Confirm toggles the recorded content, cancel keeps it
//! (with `unknown` treated like `empty`). No answer within the bound loses
//! what the device knew: the content becomes `unknown`.

use crate::input::KeyEdges;
use crate::wait::BoundedWait;
use keybox_core::ContentStatus;
use keybox_core::constants::{CONTENT_WAIT_MS, DIALOG_POLL_INTERVAL_MS};
use keybox_hardware::{KeypadDevice, KeypadInput, Watchdog};
use std::time::Duration;
use tracing::debug;

/// The user's reaction to the content question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAnswer {
    /// Confirm: the content changed.
    Confirmed,
    /// Cancel: the content did not change.
    Declined,
    NoAnswer,
}

impl ContentAnswer {
    /// Content after this answer, given what was recorded before.
    pub fn apply(self, before: ContentStatus) -> ContentStatus {
        match self {
            ContentAnswer::Confirmed => before.after_confirm(),
            ContentAnswer::Declined => before.after_decline(),
            ContentAnswer::NoAnswer => ContentStatus::Unknown,
        }
    }
}

/// Bounded wait for the answer to the content question.
#[derive(Debug, Clone)]
pub struct ContentDialog {
    limit: Duration,
    poll_interval: Duration,
}

impl Default for ContentDialog {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(CONTENT_WAIT_MS),
            Duration::from_millis(DIALOG_POLL_INTERVAL_MS),
        )
    }
}

impl ContentDialog {
    pub fn new(limit: Duration, poll_interval: Duration) -> Self {
        Self {
            limit,
            poll_interval,
        }
    }

    /// Wait for confirm or cancel, feeding the watchdog while waiting.
    ///
    /// A key already held when the question appears is ignored.
    pub async fn ask<K, W>(&self, keypad: &mut K, watchdog: &W) -> ContentAnswer
    where
        K: KeypadDevice,
        W: Watchdog + ?Sized,
    {
        let mut wait = BoundedWait::new(self.limit, self.poll_interval);
        let mut keys = KeyEdges::primed(keypad).await;

        while wait.tick().await {
            watchdog.feed();

            let answer = match keys.poll(keypad).await {
                Some(KeypadInput::Confirm) => ContentAnswer::Confirmed,
                Some(KeypadInput::Cancel) => ContentAnswer::Declined,
                _ => continue,
            };
            if let Err(e) = keypad.click().await {
                debug!(error = %e, "Haptic click failed");
            }
            return answer;
        }

        ContentAnswer::NoAnswer
    }
}
