//! Timing and policy constants for the keybox controller.
//!
//! Every retry count and timeout the device uses lives here under a name, so
//! the policy can be read, tuned and tested in one place instead of being
//! buried as literal iteration counts inside loops.
//!
//! # Time base
//!
//! All durations are expressed in milliseconds. The production firmware runs
//! its supervisory loop at roughly 50 ms per iteration; the periodic task
//! tiers below are counted in loop iterations against that period.
//!
//! ```
//! use keybox_core::constants::*;
//! use std::time::Duration;
//!
//! let ceiling = Duration::from_millis(LOCK_ASSERT_CEILING_MS);
//! assert!(ceiling < Duration::from_secs(WATCHDOG_TIMEOUT_SECS));
//! ```

// ============================================================================
// Access codes
// ============================================================================

/// Length of a normal, remotely-issued access code.
pub const NORMAL_CODE_LENGTH: usize = 4;

/// Length of a maintenance code (two-digit compartment id + secret prefix).
pub const MAINTENANCE_CODE_LENGTH: usize = 8;

/// Maximum number of symbols buffered from the keypad. Further input is ignored.
pub const MAX_CODE_BUFFER: usize = MAINTENANCE_CODE_LENGTH;

/// Number of leading code characters echoed on the display.
pub const CODE_ECHO_LENGTH: usize = NORMAL_CODE_LENGTH;

/// Byte range of the compartment id inside a maintenance code.
pub const MAINTENANCE_ID_RANGE: std::ops::Range<usize> = 0..2;

/// Byte range of the secret prefix inside a maintenance code.
pub const MAINTENANCE_PREFIX_RANGE: std::ops::Range<usize> = 2..8;

/// Length of the configured maintenance prefix.
pub const MAINTENANCE_PREFIX_LENGTH: usize = 6;

/// Compartment id that a maintenance code uses to address every compartment.
pub const ALL_COMPARTMENTS_ID: u8 = 99;

/// Sentinel recorded in audit events instead of a literal maintenance code.
pub const MAINTENANCE_CODE_SENTINEL: &str = "maintenance";

// ============================================================================
// Compartment identity and topology
// ============================================================================

/// Lowest valid compartment id.
pub const MIN_COMPARTMENT_ID: u8 = 1;

/// Highest valid compartment id (99 is reserved for "all compartments").
pub const MAX_COMPARTMENT_ID: u8 = 98;

/// Slot positions per detected hardware row (one port expander board).
pub const SLOTS_PER_ROW: usize = 8;

/// Offset, in slot positions, from a large compartment's first slot to the
/// slot directly below it on the next row.
pub const LARGE_COMPARTMENT_ROW_OFFSET: usize = SLOTS_PER_ROW;

// ============================================================================
// Lock actuation
// ============================================================================

/// Lock assertion time for the first unlock attempt.
pub const FIRST_ATTEMPT_ASSERT_MS: u64 = 1_000;

/// Lock assertion time for the second (and last) unlock attempt.
pub const SECOND_ATTEMPT_ASSERT_MS: u64 = 3_000;

/// Hard ceiling on a single lock assertion. The output is released when this
/// elapses, whatever the requested duration.
pub const LOCK_ASSERT_CEILING_MS: u64 = 5_000;

/// Door sensor polling interval while the lock is asserted.
pub const DOOR_POLL_INTERVAL_MS: u64 = 100;

/// Pause between a failed first attempt and the retry.
pub const RETRY_GRACE_MS: u64 = 5_000;

/// Number of unlock attempts per transaction.
pub const MAX_UNLOCK_ATTEMPTS: u8 = 2;

/// Lock assertion time used when opening every compartment at once.
pub const OPEN_ALL_ASSERT_MS: u64 = 2_000;

// ============================================================================
// User dialogs
// ============================================================================

/// How long to wait for the user to close the door after a successful open.
pub const CLOSE_WAIT_MS: u64 = 60_000;

/// How long to wait for an answer to the content question.
pub const CONTENT_WAIT_MS: u64 = 60_000;

/// Polling interval of the close-wait and content dialogs.
pub const DIALOG_POLL_INTERVAL_MS: u64 = 100;

/// Time the "compartment opening" notice stays up before actuation.
pub const OPEN_NOTICE_MS: u64 = 1_000;

/// Dwell time for the "door blocked" hint before the retry.
pub const DOOR_BLOCKED_NOTICE_MS: u64 = RETRY_GRACE_MS;

/// Dwell time for the "door did not open" message.
pub const DOOR_FAILED_NOTICE_MS: u64 = 8_000;

/// Dwell time for rejection messages (invalid code, absent compartment).
pub const REJECT_NOTICE_MS: u64 = 3_000;

// ============================================================================
// Supervisory loop
// ============================================================================

/// Target duration of one supervisory loop iteration.
pub const LOOP_PERIOD_MS: u64 = 50;

/// Sleep inserted at the end of every iteration to hit [`LOOP_PERIOD_MS`].
pub const LOOP_SLEEP_MS: u64 = 45;

/// Iterations between fast periodic tasks (~5 s): watchdog, brightness, supply.
pub const FAST_TIER_ITERATIONS: u64 = 101;

/// Iterations between command-channel polls (~15 s).
pub const COMMAND_TIER_ITERATIONS: u64 = 301;

/// Iterations between slow periodic tasks (~5 min): keepalive, battery, reset.
pub const SLOW_TIER_ITERATIONS: u64 = 6_001;

/// Watchdog timeout. Every blocking wait must feed the watchdog or stay well below this.
pub const WATCHDOG_TIMEOUT_SECS: u64 = 30;

/// Local hour in which the daily restart is allowed to fire.
pub const DAILY_RESET_HOUR: u32 = 3;

/// Minimum uptime before a scheduled restart may fire (3 h 20 min).
pub const RESET_UPTIME_FLOOR_SECS: u64 = 12_000;

// ============================================================================
// Remote backend
// ============================================================================

/// Default per-call timeout for backend requests.
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 5_000;

/// Timeout for a single command-channel poll.
pub const COMMAND_POLL_TIMEOUT_MS: u64 = 1_500;

/// Capacity of the queue between the error-log sink and the backend.
pub const ERROR_LOG_QUEUE_CAPACITY: usize = 32;

/// HTTP status the backend answers with on success.
pub const STATUS_OK: u16 = 200;

// ============================================================================
// Ambient sensing
// ============================================================================

/// Battery voltage below which the low-battery indicator is raised.
pub const LOW_BATTERY_VOLTS: f32 = 3.5;

/// Ambient light reading treated as full brightness.
pub const FULL_BRIGHTNESS_LIGHT: f32 = 100.0;

/// Backlight floor so the display never goes completely dark.
pub const MIN_BRIGHTNESS: f32 = 0.1;

/// Acceleration across the mounting plane (m/s²) that trips the tamper alarm.
pub const TAMPER_ACCEL_THRESHOLD: f32 = 1.0;

/// Number of log lines the startup display shows.
pub const DISPLAY_LOG_LINES: usize = 5;

/// Wall-clock year before which the clock is considered unset.
pub const MIN_PLAUSIBLE_YEAR: i32 = 2023;
