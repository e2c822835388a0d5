//! Lock actuation.
//!
//! Opening a compartment is a short, self-contained state machine that lives
//! only for the duration of one call:
//!
//! ```text
//! Idle ──> Actuating(1) ──> Open
//!  │            │
//!  │            └──(grace)──> Actuating(2) ──> Open
//!  │                               │
//!  └──> Open (already open)        └──> Failed
//! ```
//!
//! Every assertion of a lock output is bounded by [`ActuationPolicy::ceiling`]
//! and always followed by a release, whatever the door sensors report.
//!
//! A compartment counts as open only while all of its sensors read open;
//! one closed sensor (or a failed read) makes the whole compartment closed.

use crate::input::KeyEdges;
use crate::wait::BoundedWait;
use keybox_core::constants::{
    CLOSE_WAIT_MS, DOOR_POLL_INTERVAL_MS, FIRST_ATTEMPT_ASSERT_MS, LOCK_ASSERT_CEILING_MS,
    MAX_UNLOCK_ATTEMPTS, OPEN_ALL_ASSERT_MS, RETRY_GRACE_MS, SECOND_ATTEMPT_ASSERT_MS,
};
use keybox_core::{Error, Result};
use keybox_hardware::{KeypadDevice, KeypadInput, LockBank, SlotId, Watchdog};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Timing of the unlock and close-wait cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationPolicy {
    /// Assert duration per attempt; its length is the attempt count.
    pub attempts: Vec<Duration>,

    /// Hard upper bound on any single assertion.
    pub ceiling: Duration,

    /// Door sensor poll interval.
    pub poll_interval: Duration,

    /// Pause between a failed attempt and the next one.
    pub retry_grace: Duration,

    /// Assert duration used when opening every compartment.
    pub open_all: Duration,

    /// How long to wait for the user to close the door.
    pub close_wait: Duration,
}

impl Default for ActuationPolicy {
    fn default() -> Self {
        Self {
            attempts: vec![
                Duration::from_millis(FIRST_ATTEMPT_ASSERT_MS),
                Duration::from_millis(SECOND_ATTEMPT_ASSERT_MS),
            ],
            ceiling: Duration::from_millis(LOCK_ASSERT_CEILING_MS),
            poll_interval: Duration::from_millis(DOOR_POLL_INTERVAL_MS),
            retry_grace: Duration::from_millis(RETRY_GRACE_MS),
            open_all: Duration::from_millis(OPEN_ALL_ASSERT_MS),
            close_wait: Duration::from_millis(CLOSE_WAIT_MS),
        }
    }
}

/// Phase of one unlock cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuationPhase {
    Idle,
    Actuating { attempt: u8 },
    Open,
    Failed,
}

impl ActuationPhase {
    /// Check whether the cycle may move from this phase to `target`.
    ///
    /// ```
    /// use keybox_engine::actuator::ActuationPhase;
    ///
    /// let first = ActuationPhase::Actuating { attempt: 1 };
    /// assert!(ActuationPhase::Idle.can_transition_to(&first));
    /// assert!(first.can_transition_to(&ActuationPhase::Actuating { attempt: 2 }));
    /// assert!(!first.can_transition_to(&ActuationPhase::Actuating { attempt: 3 }));
    /// ```
    pub fn can_transition_to(&self, target: &ActuationPhase) -> bool {
        match (self, target) {
            (ActuationPhase::Idle, ActuationPhase::Actuating { attempt: 1 })
            | (ActuationPhase::Idle, ActuationPhase::Open)
            | (ActuationPhase::Actuating { .. }, ActuationPhase::Open) => true,
            (
                ActuationPhase::Actuating { attempt: from },
                ActuationPhase::Actuating { attempt: to },
            ) => *to == from + 1 && *to <= MAX_UNLOCK_ATTEMPTS,
            (ActuationPhase::Actuating { attempt }, ActuationPhase::Failed) => {
                *attempt == MAX_UNLOCK_ATTEMPTS
            }
            _ => false,
        }
    }

    /// Returns `true` for `Open` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActuationPhase::Open | ActuationPhase::Failed)
    }
}

impl fmt::Display for ActuationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationPhase::Idle => write!(f, "Idle"),
            ActuationPhase::Actuating { attempt } => write!(f, "Actuating({attempt})"),
            ActuationPhase::Open => write!(f, "Open"),
            ActuationPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Ordered record of the phases one cycle went through.
#[derive(Debug, Clone)]
struct PhaseTrail {
    phases: Vec<ActuationPhase>,
}

impl PhaseTrail {
    fn new() -> Self {
        Self {
            phases: vec![ActuationPhase::Idle],
        }
    }

    fn current(&self) -> ActuationPhase {
        self.phases.last().copied().unwrap_or(ActuationPhase::Idle)
    }

    fn transition_to(&mut self, target: ActuationPhase) -> Result<()> {
        let current = self.current();
        if !current.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: target.to_string(),
            });
        }
        debug!(from = %current, to = %target, "Actuation phase change");
        self.phases.push(target);
        Ok(())
    }
}

/// Outcome of [`LockActuator::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationReport {
    /// `true` if a door sensor confirmed the compartment open.
    pub opened: bool,

    /// Lock assertions made; zero when the door was already open.
    pub attempts: u8,

    /// Every phase the cycle went through, starting with `Idle`.
    pub phases: Vec<ActuationPhase>,
}

/// Outcome of waiting for the user to close a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    TimedOut,
    /// The user pressed cancel before the door closed.
    Cancelled,
}

/// Drives lock outputs and reads door sensors for one compartment at a time.
#[derive(Debug, Clone, Default)]
pub struct LockActuator {
    policy: ActuationPolicy,
}

impl LockActuator {
    pub fn new(policy: ActuationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ActuationPolicy {
        &self.policy
    }

    /// Read the sensors of a compartment; open only if every one reads open.
    pub async fn door_open<L: LockBank>(&self, locks: &mut L, slots: &[SlotId]) -> bool {
        if slots.is_empty() {
            return false;
        }
        for slot in slots {
            match locks.is_door_open(*slot).await {
                Ok(true) => {}
                Ok(false) => return false,
                Err(e) => {
                    warn!(%slot, error = %e, "Door sensor read failed");
                    return false;
                }
            }
        }
        true
    }

    /// Assert the locks of a compartment for up to `duration`, stopping
    /// early once the door reads open.
    ///
    /// The assertion never exceeds the policy ceiling, and the locks are
    /// released before returning. Returns `true` if the door opened.
    pub async fn pulse<L: LockBank>(
        &self,
        locks: &mut L,
        slots: &[SlotId],
        duration: Duration,
    ) -> bool {
        for slot in slots {
            if let Err(e) = locks.set_lock(*slot, true).await {
                error!(%slot, error = %e, "Failed to assert lock");
            }
        }

        let limit = duration.min(self.policy.ceiling);
        let mut window = BoundedWait::new(limit, self.policy.poll_interval);
        let mut opened = false;
        loop {
            if self.door_open(locks, slots).await {
                opened = true;
                break;
            }
            if !window.tick().await {
                break;
            }
        }

        for slot in slots {
            if let Err(e) = locks.set_lock(*slot, false).await {
                error!(%slot, error = %e, "Failed to release lock");
            }
        }

        // A door can spring open as the latch lets go.
        opened || self.door_open(locks, slots).await
    }

    /// Run the full unlock cycle for one compartment.
    ///
    /// `on_retry` is called with the next attempt number before the grace
    /// pause that precedes every retry, so the caller can tell the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the configured attempt
    /// list does not fit the unlock cycle.
    pub async fn open<L: LockBank>(
        &self,
        locks: &mut L,
        slots: &[SlotId],
        mut on_retry: impl FnMut(u8),
    ) -> Result<ActuationReport> {
        let mut trail = PhaseTrail::new();

        if self.door_open(locks, slots).await {
            debug!("Door already open, no actuation needed");
            trail.transition_to(ActuationPhase::Open)?;
            return Ok(ActuationReport {
                opened: true,
                attempts: 0,
                phases: trail.phases,
            });
        }

        let mut attempts: u8 = 0;
        for (index, duration) in self.policy.attempts.iter().enumerate() {
            let attempt = u8::try_from(index + 1).unwrap_or(u8::MAX);
            if attempt > 1 {
                on_retry(attempt);
                tokio::time::sleep(self.policy.retry_grace).await;
            }

            trail.transition_to(ActuationPhase::Actuating { attempt })?;
            attempts = attempt;

            if self.pulse(locks, slots, *duration).await {
                trail.transition_to(ActuationPhase::Open)?;
                return Ok(ActuationReport {
                    opened: true,
                    attempts,
                    phases: trail.phases,
                });
            }
            debug!(attempt, "Door did not open");
        }

        trail.transition_to(ActuationPhase::Failed)?;
        Ok(ActuationReport {
            opened: false,
            attempts,
            phases: trail.phases,
        })
    }

    /// Wait for the user to close a compartment's door.
    ///
    /// Polls the sensors until the door reads closed, the user presses
    /// cancel, or `limit` passes. The watchdog is fed on every poll.
    pub async fn wait_for_close<L, K, W>(
        &self,
        locks: &mut L,
        slots: &[SlotId],
        keypad: &mut K,
        watchdog: &W,
        limit: Duration,
    ) -> CloseOutcome
    where
        L: LockBank,
        K: KeypadDevice,
        W: Watchdog + ?Sized,
    {
        let mut wait = BoundedWait::new(limit, self.policy.poll_interval);
        let mut keys = KeyEdges::primed(keypad).await;

        loop {
            if !self.door_open(locks, slots).await {
                return CloseOutcome::Closed;
            }
            if !wait.tick().await {
                return CloseOutcome::TimedOut;
            }
            watchdog.feed();

            if keys.poll(keypad).await == Some(KeypadInput::Cancel) {
                if let Err(e) = keypad.click().await {
                    debug!(error = %e, "Haptic click failed");
                }
                return CloseOutcome::Cancelled;
            }
        }
    }
}
