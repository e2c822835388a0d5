//! Device-wide state shared by all engine components.

use crate::config::KeyboxConfig;
use crate::registry::CompartmentRegistry;
use chrono::{DateTime, Local};
use keybox_core::{DeviceStatus, VERSION};
use keybox_hardware::Watchdog;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Source of local wall-clock time.
///
/// Only used for timestamps and the daily reset window; every duration in
/// the engine is measured on the monotonic clock.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that always reads the same time, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl WallClock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Who the device is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial: String,
    pub version: String,
    pub hardware_revision: String,

    /// Compartment count from the configuration, not what was detected.
    pub configured_compartments: usize,
    pub large_compartments: Vec<usize>,
}

/// Runtime feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFlags {
    pub content_tracking: bool,
    pub tamper_alarm: bool,
}

/// Everything the supervisor and its components share, built once at
/// startup.
pub struct DeviceContext {
    pub registry: CompartmentRegistry,
    pub identity: DeviceIdentity,
    pub flags: DeviceFlags,
    started_at: Instant,
    clock: Arc<dyn WallClock>,
    watchdog: Arc<dyn Watchdog>,
}

impl DeviceContext {
    pub fn new(
        config: &KeyboxConfig,
        registry: CompartmentRegistry,
        clock: Arc<dyn WallClock>,
        watchdog: Arc<dyn Watchdog>,
    ) -> Self {
        Self {
            registry,
            identity: DeviceIdentity {
                serial: config.device.serial.clone(),
                version: VERSION.to_string(),
                hardware_revision: config.device.hardware_revision.clone(),
                configured_compartments: config.device.compartments,
                large_compartments: config.device.large_compartments.clone(),
            },
            flags: DeviceFlags {
                content_tracking: config.device.content_tracking,
                tamper_alarm: config.device.tamper_alarm,
            },
            started_at: Instant::now(),
            clock,
            watchdog,
        }
    }

    /// Time since the context was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn watchdog(&self) -> &dyn Watchdog {
        self.watchdog.as_ref()
    }

    /// Keepalive snapshot.
    pub fn device_status(&self) -> DeviceStatus {
        DeviceStatus {
            uptime: self.uptime(),
            serial: self.identity.serial.clone(),
            version: self.identity.version.clone(),
            compartment_count: self.identity.configured_compartments,
            large_compartments: self.identity.large_compartments.clone(),
        }
    }
}

impl std::fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("identity", &self.identity)
            .field("flags", &self.flags)
            .field("compartments", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use keybox_hardware::mock::MockWatchdog;

    fn context() -> DeviceContext {
        let config = KeyboxConfig::default()
            .with_serial("SK-7")
            .with_compartments(14)
            .with_large_compartments(vec![5]);
        let registry = CompartmentRegistry::from_topology(2, &[5]).unwrap();
        let clock = FixedClock(Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        DeviceContext::new(&config, registry, Arc::new(clock), Arc::new(MockWatchdog::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_status() {
        let ctx = context();
        tokio::time::advance(Duration::from_secs(90)).await;

        let status = ctx.device_status();
        assert_eq!(status.uptime, Duration::from_secs(90));
        assert_eq!(status.serial, "SK-7");
        assert_eq!(status.version, VERSION);
        assert_eq!(status.compartment_count, 14);
        assert_eq!(status.large_compartments, vec![5]);
    }

    #[tokio::test]
    async fn test_fixed_clock() {
        let ctx = context();
        assert_eq!(ctx.now().format("%H:%M").to_string(), "12:00");
        assert!(ctx.flags.content_tracking);
        assert!(!ctx.flags.tamper_alarm);
    }
}
