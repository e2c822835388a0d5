//! Mock ambient sensors and watchdog.

use crate::{
    HardwareError, Result,
    traits::{BatteryMonitor, LightSensor, MotionSensor, SupplyMonitor, Watchdog},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy)]
struct AmbientState {
    /// `None` makes the light sensor fail.
    light: Option<f32>,
    voltage: f32,
    percent: f32,
    supply: bool,
    acceleration: (f32, f32, f32),
}

fn lock(state: &Mutex<AmbientState>) -> MutexGuard<'_, AmbientState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared ambient conditions seen by the mock sensors.
///
/// Defaults to daylight, a full battery and mains supply present.
#[derive(Debug, Clone)]
pub struct MockAmbient {
    state: Arc<Mutex<AmbientState>>,
}

impl Default for MockAmbient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAmbient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AmbientState {
                light: Some(100.0),
                voltage: 4.1,
                percent: 95.0,
                supply: true,
                acceleration: (0.0, 0.0, 0.0),
            })),
        }
    }

    pub fn light_sensor(&self) -> MockLightSensor {
        MockLightSensor(Arc::clone(&self.state))
    }

    pub fn battery(&self) -> MockBattery {
        MockBattery(Arc::clone(&self.state))
    }

    pub fn supply(&self) -> MockSupply {
        MockSupply(Arc::clone(&self.state))
    }

    pub fn motion_sensor(&self) -> MockMotionSensor {
        MockMotionSensor(Arc::clone(&self.state))
    }

    /// Set the light level; `None` makes reads fail.
    pub fn set_light(&self, light: Option<f32>) {
        lock(&self.state).light = light;
    }

    pub fn set_battery(&self, voltage: f32, percent: f32) {
        let mut state = lock(&self.state);
        state.voltage = voltage;
        state.percent = percent;
    }

    pub fn set_supply(&self, present: bool) {
        lock(&self.state).supply = present;
    }

    pub fn set_acceleration(&self, x: f32, y: f32, z: f32) {
        lock(&self.state).acceleration = (x, y, z);
    }
}

#[derive(Debug)]
pub struct MockLightSensor(Arc<Mutex<AmbientState>>);

impl LightSensor for MockLightSensor {
    fn visible_light(&mut self) -> Result<f32> {
        lock(&self.0)
            .light
            .ok_or_else(|| HardwareError::communication("light sensor not responding"))
    }
}

#[derive(Debug)]
pub struct MockBattery(Arc<Mutex<AmbientState>>);

impl BatteryMonitor for MockBattery {
    fn cell_voltage(&mut self) -> Result<f32> {
        Ok(lock(&self.0).voltage)
    }

    fn cell_percent(&mut self) -> Result<f32> {
        Ok(lock(&self.0).percent)
    }
}

#[derive(Debug)]
pub struct MockSupply(Arc<Mutex<AmbientState>>);

impl SupplyMonitor for MockSupply {
    fn supply_present(&mut self) -> bool {
        lock(&self.0).supply
    }
}

#[derive(Debug)]
pub struct MockMotionSensor(Arc<Mutex<AmbientState>>);

impl MotionSensor for MockMotionSensor {
    fn acceleration(&mut self) -> Result<(f32, f32, f32)> {
        Ok(lock(&self.0).acceleration)
    }
}

/// Watchdog that only counts feeds.
#[derive(Debug, Clone, Default)]
pub struct MockWatchdog {
    feeds: Arc<AtomicUsize>,
}

impl MockWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> usize {
        self.feeds.load(Ordering::Relaxed)
    }
}

impl Watchdog for MockWatchdog {
    fn feed(&self) {
        self.feeds.fetch_add(1, Ordering::Relaxed);
    }
}
