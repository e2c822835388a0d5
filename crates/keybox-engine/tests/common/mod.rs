//! Shared rig for supervisor integration tests.
//!
//! Builds a [`Supervisor`] on top of the hardware and network mocks and
//! keeps the mock handles around for driving and inspecting it. Doors open
//! as soon as their lock is asserted and close by themselves two seconds
//! later, unless a test says otherwise.

#![allow(dead_code)]

use chrono::{DateTime, Local, TimeZone};
use keybox_core::{AccessCode, CodeTable, CompartmentId, ContentStatus, DoorStatus};
use keybox_engine::{
    CodeValidator, CompartmentRegistry, DeviceContext, DisplayLog, ErrorQueue, FixedClock,
    KeyboxConfig, RemoteSync, Sensors, Supervisor, display_log,
};
use keybox_hardware::mock::{
    MockAmbient, MockKeypad, MockKeypadHandle, MockLockBank, MockLockBankHandle, MockPanel,
    MockPanelHandle, MockWatchdog,
};
use keybox_hardware::types::SlotId;
use keybox_network::{MockTransport, QueuedCommands};
use std::sync::Arc;
use std::time::Duration;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::prelude::*;

pub const MAINTENANCE_PREFIX: &str = "480193";

pub type TestSupervisor = Supervisor<MockKeypad, MockLockBank, MockTransport, QueuedCommands>;

pub fn noon() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn id(n: u8) -> CompartmentId {
    CompartmentId::new(n).unwrap()
}

/// Backend code table: compartment 3 opens with `1234`, 5 with `5555`.
pub fn codes() -> CodeTable {
    let mut table = CodeTable::new();
    table.insert(id(3), AccessCode::new("1234").unwrap());
    table.insert(id(5), AccessCode::new("5555").unwrap());
    table
}

/// Record INFO and above on this thread until the guard drops.
///
/// Lines read `LEVEL: message fields`.
pub fn capture_logs() -> (DefaultGuard, DisplayLog) {
    let (layer, log) = display_log(1_000);
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));
    (guard, log)
}

pub struct Options {
    pub rows: usize,
    pub configured: usize,
    pub clock: DateTime<Local>,
    pub commands: QueuedCommands,
    pub display: Option<DisplayLog>,
    pub errors: Option<ErrorQueue>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rows: 1,
            configured: 8,
            clock: noon(),
            commands: QueuedCommands::new(),
            display: None,
            errors: None,
        }
    }
}

pub struct Rig {
    pub supervisor: TestSupervisor,
    pub keys: MockKeypadHandle,
    pub locks: MockLockBankHandle,
    pub panel: MockPanelHandle,
    pub transport: MockTransport,
    pub watchdog: MockWatchdog,
    pub ambient: MockAmbient,
}

pub fn rig() -> Rig {
    build(Options::default())
}

pub fn build(options: Options) -> Rig {
    let config = KeyboxConfig::default()
        .with_serial("SK-TEST")
        .with_compartments(options.configured)
        .with_maintenance_prefix(MAINTENANCE_PREFIX);
    let registry = CompartmentRegistry::from_topology(options.rows, &[]).unwrap();

    let (keypad, keys) = MockKeypad::new();
    let (lock_bank, locks) = MockLockBank::new(options.rows);
    locks.set_default_behavior(Duration::ZERO, Some(Duration::from_secs(2)));
    let (panel_device, panel) = MockPanel::new();
    let transport = MockTransport::with_codes(codes());
    let watchdog = MockWatchdog::new();
    let ambient = MockAmbient::new();

    let ctx = DeviceContext::new(
        &config,
        registry,
        Arc::new(FixedClock(options.clock)),
        Arc::new(watchdog.clone()),
    );
    let mut sync = RemoteSync::new(transport.clone(), Duration::from_secs(5));
    if let Some(errors) = options.errors {
        sync = sync.with_error_queue(errors);
    }
    let sensors = Sensors {
        light: Some(Box::new(ambient.light_sensor())),
        battery: Some(Box::new(ambient.battery())),
        supply: Some(Box::new(ambient.supply())),
        motion: Some(Box::new(ambient.motion_sensor())),
    };

    let mut supervisor = Supervisor::new(
        ctx,
        keypad,
        lock_bank,
        Box::new(panel_device),
        sync,
        CodeValidator::new(MAINTENANCE_PREFIX),
    )
    .with_sensors(sensors)
    .with_commands(options.commands);
    if let Some(display) = options.display {
        supervisor = supervisor.with_display_log(display);
    }

    Rig {
        supervisor,
        keys,
        locks,
        panel,
        transport,
        watchdog,
        ambient,
    }
}

impl Rig {
    /// First lock/sensor slot of compartment `n`.
    pub fn slot(&self, n: u8) -> SlotId {
        self.supervisor.context().registry.get(id(n)).unwrap().slots()[0]
    }

    /// First LED of compartment `n`.
    pub fn led(&self, n: u8) -> usize {
        self.supervisor.context().registry.get(id(n)).unwrap().leds()[0]
    }

    pub fn state(&self, n: u8) -> (ContentStatus, DoorStatus) {
        self.supervisor
            .context()
            .registry
            .get(id(n))
            .unwrap()
            .snapshot()
    }

    pub fn set_content(&mut self, n: u8, content: ContentStatus) {
        self.supervisor
            .context_mut()
            .registry
            .get_mut(id(n))
            .unwrap()
            .content_status = content;
    }

    /// Run loop iterations the way [`Supervisor::run`] does.
    pub async fn run_ticks(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.supervisor.tick().await;
            tokio::time::sleep(Duration::from_millis(45)).await;
        }
    }

    /// Run the loop until `count` audit records reached the backend.
    pub async fn run_until_audited(&mut self, count: usize) {
        for _ in 0..1_000 {
            if self.transport.audits().len() >= count {
                return;
            }
            self.supervisor.tick().await;
            tokio::time::sleep(Duration::from_millis(45)).await;
        }
        panic!("no audit record after 1000 iterations");
    }

    /// Tap `key` after `delay`, from a separate task.
    pub fn tap_later(&self, delay: Duration, key: keybox_hardware::KeypadInput) {
        let keys = self.keys.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            keys.tap(key).await.unwrap();
        });
    }
}
