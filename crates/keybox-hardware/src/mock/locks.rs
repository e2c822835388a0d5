//! Mock lock bank for testing and simulation.
//!
//! Each slot is modelled as a spring-loaded door held by a solenoid latch:
//! asserting the lock lets the door spring open after a configurable delay,
//! unless the slot is jammed for the current attempt. Doors optionally close
//! by themselves some time after opening, standing in for the user.
//!
//! Time is measured with [`tokio::time::Instant`] so tests can run the
//! simulation under a paused clock.

use crate::{
    HardwareError, Result,
    traits::LockBank,
    types::SlotId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct SlotBehavior {
    /// Delay between lock assertion and the door springing open.
    open_delay: Duration,

    /// Close the door automatically this long after it opened.
    auto_close_after: Option<Duration>,

    /// Remaining assertions during which the latch will not release.
    jammed_attempts: u32,

    /// Fail every sensor read.
    read_fault: bool,
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    behavior: SlotBehavior,
    engaged_since: Option<Instant>,
    door_open: bool,
    opened_at: Option<Instant>,
    assertions: Vec<Duration>,
}

impl SlotState {
    /// Advance the simulation to `now`.
    fn settle(&mut self, now: Instant) {
        if let Some(since) = self.engaged_since
            && !self.door_open
            && self.behavior.jammed_attempts == 0
            && now.duration_since(since) >= self.behavior.open_delay
        {
            self.door_open = true;
            self.opened_at = Some(now);
        }

        if let (true, Some(opened_at), Some(after)) =
            (self.door_open, self.opened_at, self.behavior.auto_close_after)
            && self.engaged_since.is_none()
            && now.duration_since(opened_at) >= after
        {
            self.door_open = false;
            self.opened_at = None;
        }
    }
}

#[derive(Debug)]
struct BankState {
    rows: usize,
    defaults: SlotBehavior,
    slots: HashMap<SlotId, SlotState>,
}

impl BankState {
    fn slot(&mut self, slot: SlotId) -> Result<&mut SlotState> {
        if usize::from(slot.row) >= self.rows {
            return Err(HardwareError::unknown_slot(slot));
        }
        let defaults = self.defaults.clone();
        Ok(self.slots.entry(slot).or_insert_with(|| SlotState {
            behavior: defaults,
            ..SlotState::default()
        }))
    }
}

fn lock(state: &Mutex<BankState>) -> MutexGuard<'_, BankState> {
    // The state holds no invariants a panicking test could break halfway.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock lock bank with simulated doors.
///
/// # Examples
///
/// ```
/// use keybox_hardware::mock::MockLockBank;
/// use keybox_hardware::traits::LockBank;
/// use keybox_hardware::types::SlotId;
///
/// #[tokio::main]
/// async fn main() -> keybox_hardware::Result<()> {
///     let (mut bank, handle) = MockLockBank::new(1);
///     let slot = SlotId::new(0, 2);
///
///     bank.set_lock(slot, true).await?;
///     assert!(bank.is_door_open(slot).await?);
///     bank.set_lock(slot, false).await?;
///
///     assert_eq!(handle.assertion_count(slot), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockLockBank {
    state: Arc<Mutex<BankState>>,
}

impl MockLockBank {
    /// Create a lock bank with `rows` detected row boards.
    pub fn new(rows: usize) -> (Self, MockLockBankHandle) {
        let state = Arc::new(Mutex::new(BankState {
            rows,
            defaults: SlotBehavior::default(),
            slots: HashMap::new(),
        }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockLockBankHandle { state },
        )
    }
}

impl LockBank for MockLockBank {
    fn detected_rows(&self) -> usize {
        lock(&self.state).rows
    }

    async fn set_lock(&mut self, slot: SlotId, engaged: bool) -> Result<()> {
        let now = Instant::now();
        let mut bank = lock(&self.state);
        let state = bank.slot(slot)?;

        state.settle(now);
        match (engaged, state.engaged_since) {
            (true, None) => {
                debug!(%slot, "Lock asserted");
                state.engaged_since = Some(now);
            }
            (false, Some(since)) => {
                let held = now.duration_since(since);
                debug!(%slot, held_ms = held.as_millis() as u64, "Lock released");
                state.assertions.push(held);
                state.engaged_since = None;
                if !state.door_open && state.behavior.jammed_attempts > 0 {
                    state.behavior.jammed_attempts -= 1;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn is_door_open(&mut self, slot: SlotId) -> Result<bool> {
        let now = Instant::now();
        let mut bank = lock(&self.state);
        let state = bank.slot(slot)?;

        if state.behavior.read_fault {
            return Err(HardwareError::communication(format!(
                "sensor read failed on {slot}"
            )));
        }

        state.settle(now);
        Ok(state.door_open)
    }
}

/// Handle for configuring and inspecting a [`MockLockBank`].
#[derive(Debug, Clone)]
pub struct MockLockBankHandle {
    state: Arc<Mutex<BankState>>,
}

impl MockLockBankHandle {
    fn with_slot<T>(&self, slot: SlotId, f: impl FnOnce(&mut SlotState) -> T) -> Option<T> {
        let mut bank = lock(&self.state);
        bank.slot(slot).ok().map(f)
    }

    /// Set the open delay and auto-close behavior for slots not configured
    /// individually yet.
    pub fn set_default_behavior(&self, open_delay: Duration, auto_close_after: Option<Duration>) {
        let mut bank = lock(&self.state);
        bank.defaults.open_delay = open_delay;
        bank.defaults.auto_close_after = auto_close_after;
    }

    /// Force a door open or shut.
    pub fn set_door_open(&self, slot: SlotId, open: bool) {
        let now = Instant::now();
        self.with_slot(slot, |s| {
            s.door_open = open;
            s.opened_at = open.then_some(now);
        });
    }

    /// Delay between lock assertion and the door opening.
    pub fn set_open_delay(&self, slot: SlotId, delay: Duration) {
        self.with_slot(slot, |s| s.behavior.open_delay = delay);
    }

    /// Let the door close on its own this long after opening.
    pub fn set_auto_close(&self, slot: SlotId, after: Option<Duration>) {
        self.with_slot(slot, |s| s.behavior.auto_close_after = after);
    }

    /// Keep the latch from releasing for the next `attempts` assertions.
    pub fn jam(&self, slot: SlotId, attempts: u32) {
        self.with_slot(slot, |s| s.behavior.jammed_attempts = attempts);
    }

    /// Make every sensor read on this slot fail.
    pub fn set_read_fault(&self, slot: SlotId, fault: bool) {
        self.with_slot(slot, |s| s.behavior.read_fault = fault);
    }

    /// Current door state, without advancing the simulation.
    pub fn is_door_open(&self, slot: SlotId) -> bool {
        self.with_slot(slot, |s| s.door_open).unwrap_or(false)
    }

    /// Returns `true` while the lock output is asserted.
    pub fn is_engaged(&self, slot: SlotId) -> bool {
        self.with_slot(slot, |s| s.engaged_since.is_some())
            .unwrap_or(false)
    }

    /// Durations of all completed assertions on a slot, oldest first.
    pub fn assertions(&self, slot: SlotId) -> Vec<Duration> {
        self.with_slot(slot, |s| s.assertions.clone())
            .unwrap_or_default()
    }

    /// Number of completed assertions on a slot.
    pub fn assertion_count(&self, slot: SlotId) -> usize {
        self.assertions(slot).len()
    }

    /// Returns `true` if any lock output is still asserted.
    pub fn any_engaged(&self) -> bool {
        lock(&self.state)
            .slots
            .values()
            .any(|s| s.engaged_since.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_door_opens_after_delay() {
        let (mut bank, handle) = MockLockBank::new(1);
        let slot = SlotId::new(0, 0);
        handle.set_open_delay(slot, Duration::from_millis(300));

        bank.set_lock(slot, true).await.unwrap();
        assert!(!bank.is_door_open(slot).await.unwrap());

        tokio::time::advance(Duration::from_millis(300)).await;
        assert!(bank.is_door_open(slot).await.unwrap());

        bank.set_lock(slot, false).await.unwrap();
        assert_eq!(handle.assertions(slot), vec![Duration::from_millis(300)]);
        assert!(!handle.is_engaged(slot));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jam_blocks_one_attempt() {
        let (mut bank, handle) = MockLockBank::new(1);
        let slot = SlotId::new(0, 1);
        handle.jam(slot, 1);

        bank.set_lock(slot, true).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!bank.is_door_open(slot).await.unwrap());
        bank.set_lock(slot, false).await.unwrap();

        bank.set_lock(slot, true).await.unwrap();
        assert!(bank.is_door_open(slot).await.unwrap());
        bank.set_lock(slot, false).await.unwrap();

        assert_eq!(handle.assertion_count(slot), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_close_after_release() {
        let (mut bank, handle) = MockLockBank::new(1);
        let slot = SlotId::new(0, 3);
        handle.set_auto_close(slot, Some(Duration::from_secs(2)));

        bank.set_lock(slot, true).await.unwrap();
        assert!(bank.is_door_open(slot).await.unwrap());
        bank.set_lock(slot, false).await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(bank.is_door_open(slot).await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!bank.is_door_open(slot).await.unwrap());
    }

    #[tokio::test]
    async fn test_unwired_row_rejected() {
        let (mut bank, _handle) = MockLockBank::new(1);
        let result = bank.set_lock(SlotId::new(1, 0), true).await;
        assert!(matches!(result, Err(HardwareError::UnknownSlot { .. })));
        assert_eq!(bank.detected_rows(), 1);
    }

    #[tokio::test]
    async fn test_read_fault() {
        let (mut bank, handle) = MockLockBank::new(2);
        let slot = SlotId::new(1, 7);
        handle.set_read_fault(slot, true);
        assert!(bank.is_door_open(slot).await.is_err());
    }
}
