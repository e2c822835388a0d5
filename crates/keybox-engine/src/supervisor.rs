//! Supervisory loop.
//!
//! One cooperative loop owns every device and runs every component:
//!
//! ```text
//! tick ─┬─ keypad (edge-triggered) ──> code buffer ──> validate ──> transaction ──> audit
//!       ├─ tamper alarm
//!       ├─ every ~5 s:   watchdog, brightness, supply/backend indicators, error forwarding
//!       ├─ every ~15 s:  remote commands
//!       └─ every ~5 min: keepalive, battery, daily restart window
//! ```
//!
//! Nothing runs concurrently with a transaction: while a compartment is being
//! opened, closed and asked about, the loop is inside that transaction and
//! feeds the watchdog itself.

use crate::actuator::{CloseOutcome, LockActuator};
use crate::confirmation::{ContentAnswer, ContentDialog};
use crate::context::DeviceContext;
use crate::input::KeyEdges;
use crate::log_sinks::DisplayLog;
use crate::messages::Prompt;
use crate::sync::RemoteSync;
use crate::validator::CodeValidator;
use chrono::Timelike;
use keybox_core::constants::{
    CODE_ECHO_LENGTH, COMMAND_TIER_ITERATIONS, DAILY_RESET_HOUR, DOOR_FAILED_NOTICE_MS,
    FAST_TIER_ITERATIONS, FULL_BRIGHTNESS_LIGHT, LOOP_SLEEP_MS, LOW_BATTERY_VOLTS,
    MAX_CODE_BUFFER, MIN_BRIGHTNESS, OPEN_NOTICE_MS, REJECT_NOTICE_MS, RESET_UPTIME_FLOOR_SECS,
    SLOW_TIER_ITERATIONS, TAMPER_ACCEL_THRESHOLD,
};
use keybox_core::{
    AuditEvent, CodeLookupResult, CommandTarget, CompartmentId, ContentStatus, DoorStatus,
    RemoteCommand,
};
use keybox_hardware::{
    AnswerIcons, BatteryMonitor, FrontPanel, Indicator, KeypadDevice, KeypadInput, LedColor,
    LightSensor, LockBank, MotionSensor, SupplyMonitor,
};
use keybox_network::{BackendTransport, CommandSource};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why the loop asked for a device restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// `reset` received over the command channel.
    Remote,
    /// Daily restart window reached.
    Scheduled,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::Remote => write!(f, "remote reset command"),
            RestartReason::Scheduled => write!(f, "scheduled daily restart"),
        }
    }
}

/// Optional local sensors; absent ones are simply `None`.
#[derive(Default)]
pub struct Sensors {
    pub light: Option<Box<dyn LightSensor>>,
    pub battery: Option<Box<dyn BatteryMonitor>>,
    pub supply: Option<Box<dyn SupplyMonitor>>,
    pub motion: Option<Box<dyn MotionSensor>>,
}

impl Sensors {
    /// Names of the sensors that were not provided.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.light.is_none() {
            missing.push("light sensor");
        }
        if self.battery.is_none() {
            missing.push("battery monitor");
        }
        if self.supply.is_none() {
            missing.push("supply detection");
        }
        if self.motion.is_none() {
            missing.push("accelerometer");
        }
        missing
    }
}

/// How long user-facing notices stay up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeTiming {
    pub opening: Duration,
    pub door_failed: Duration,
    pub rejected: Duration,
}

impl Default for NoticeTiming {
    fn default() -> Self {
        Self {
            opening: Duration::from_millis(OPEN_NOTICE_MS),
            door_failed: Duration::from_millis(DOOR_FAILED_NOTICE_MS),
            rejected: Duration::from_millis(REJECT_NOTICE_MS),
        }
    }
}

/// Display brightness for an ambient light reading.
///
/// Readings are clamped to `0..=100`; the result never drops below the
/// backlight floor.
pub fn brightness_for(light: f32) -> f32 {
    let level = if light.is_nan() {
        0.0
    } else {
        light.clamp(0.0, FULL_BRIGHTNESS_LIGHT)
    };
    MIN_BRIGHTNESS + (1.0 - MIN_BRIGHTNESS) * level / FULL_BRIGHTNESS_LIGHT
}

/// The device's main loop and everything it drives.
pub struct Supervisor<K, L, T, C>
where
    K: KeypadDevice,
    L: LockBank,
    T: BackendTransport,
    C: CommandSource,
{
    ctx: DeviceContext,
    keypad: K,
    locks: L,
    panel: Box<dyn FrontPanel>,
    sensors: Sensors,
    sync: RemoteSync<T>,
    commands: Option<C>,
    validator: CodeValidator,
    actuator: LockActuator,
    dialog: ContentDialog,
    notices: NoticeTiming,
    display_log: Option<DisplayLog>,

    code: String,
    keys: KeyEdges,
    counter: u64,
    tamper_alerting: bool,
}

impl<K, L, T, C> Supervisor<K, L, T, C>
where
    K: KeypadDevice,
    L: LockBank,
    T: BackendTransport,
    C: CommandSource,
{
    pub fn new(
        ctx: DeviceContext,
        keypad: K,
        locks: L,
        panel: Box<dyn FrontPanel>,
        sync: RemoteSync<T>,
        validator: CodeValidator,
    ) -> Self {
        Self {
            ctx,
            keypad,
            locks,
            panel,
            sensors: Sensors::default(),
            sync,
            commands: None,
            validator,
            actuator: LockActuator::default(),
            dialog: ContentDialog::default(),
            notices: NoticeTiming::default(),
            display_log: None,
            code: String::new(),
            keys: KeyEdges::new(),
            counter: 0,
            tamper_alerting: false,
        }
    }

    pub fn with_sensors(mut self, sensors: Sensors) -> Self {
        self.sensors = sensors;
        self
    }

    pub fn with_commands(mut self, commands: C) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Display log to show and detach at the end of [`Supervisor::startup`].
    pub fn with_display_log(mut self, display_log: DisplayLog) -> Self {
        self.display_log = Some(display_log);
        self
    }

    pub fn with_actuator(mut self, actuator: LockActuator) -> Self {
        self.actuator = actuator;
        self
    }

    pub fn with_dialog(mut self, dialog: ContentDialog) -> Self {
        self.dialog = dialog;
        self
    }

    pub fn with_notices(mut self, notices: NoticeTiming) -> Self {
        self.notices = notices;
        self
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut DeviceContext {
        &mut self.ctx
    }

    pub fn sync(&self) -> &RemoteSync<T> {
        &self.sync
    }

    pub fn commands_mut(&mut self) -> Option<&mut C> {
        self.commands.as_mut()
    }

    /// Code typed so far.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Log diagnostics, publish the first keepalive and show the welcome
    /// screen.
    pub async fn startup(&mut self) {
        let identity = &self.ctx.identity;
        info!(
            serial = %identity.serial,
            version = %identity.version,
            hardware = %identity.hardware_revision,
            "Keybox starting"
        );
        info!(
            rows = self.ctx.registry.rows(),
            compartments = self.ctx.registry.len(),
            large = ?self.ctx.registry.large_positions(),
            "Compartment hardware detected"
        );

        let mut maintenance = false;
        let configured = identity.configured_compartments;
        if self.ctx.registry.len() < configured {
            error!(
                detected = self.ctx.registry.len(),
                configured, "Insufficient compartment hardware detected"
            );
            maintenance = true;
        }
        for name in self.sensors.missing() {
            info!("No {name} detected");
        }
        if self.sensors.light.is_none() || self.sensors.battery.is_none() {
            maintenance = true;
        }
        self.panel.set_indicator(Indicator::Maintenance, maintenance);

        let outcome = self
            .sync
            .push_status(&self.ctx.device_status(), &self.ctx.now())
            .await;
        if let Some(status) = outcome.status() {
            info!(status, "Initial keepalive answered");
        }
        self.panel
            .set_indicator(Indicator::BackendUnreachable, !outcome.is_delivered());

        if let Some(battery) = self.sensors.battery.as_mut() {
            match (battery.cell_voltage(), battery.cell_percent()) {
                (Ok(volts), Ok(percent)) => {
                    info!("Battery: {volts:.2}V, {percent:.1} %");
                    self.panel
                        .set_indicator(Indicator::LowBattery, volts < LOW_BATTERY_VOLTS);
                }
                (Err(e), _) | (_, Err(e)) => error!(error = %e, "Error reading battery"),
            }
        }

        let open = self.open_compartments().await;
        if !open.is_empty() {
            let listed: Vec<String> = open.iter().map(ToString::to_string).collect();
            warn!("Open compartments: [{}]", listed.join(", "));
            for id in open {
                if let Some(compartment) = self.ctx.registry.get_mut(id) {
                    compartment.door_status = DoorStatus::Open;
                }
            }
        }

        self.update_brightness();
        self.update_supply();
        info!("Startup complete");

        if let Some(display_log) = self.display_log.take() {
            self.panel.show_log(&display_log.lines());
            display_log.detach();
        }
        self.show_welcome();
    }

    /// Run until a restart is requested.
    pub async fn run(&mut self) -> RestartReason {
        loop {
            if let Some(reason) = self.tick().await {
                return reason;
            }
            tokio::time::sleep(Duration::from_millis(LOOP_SLEEP_MS)).await;
        }
    }

    /// One loop iteration, without the trailing sleep.
    pub async fn tick(&mut self) -> Option<RestartReason> {
        if let Some(key) = self.keys.poll(&mut self.keypad).await {
            self.click().await;
            self.handle_key(key).await;
        }

        self.check_tamper();

        let mut restart = None;
        if self.counter % FAST_TIER_ITERATIONS == 0 {
            self.fast_tasks().await;
        }
        if self.counter % COMMAND_TIER_ITERATIONS == 0 {
            restart = restart.or(self.poll_commands().await);
        }
        if self.counter == SLOW_TIER_ITERATIONS {
            self.counter = 0;
            restart = restart.or(self.slow_tasks().await);
        }
        self.counter += 1;

        restart
    }

    async fn click(&mut self) {
        if let Err(e) = self.keypad.click().await {
            debug!(error = %e, "Haptic click failed");
        }
    }

    async fn handle_key(&mut self, key: KeypadInput) {
        match key {
            KeypadInput::Confirm => {
                if !self.code.is_empty() {
                    self.process_code().await;
                }
            }
            KeypadInput::Cancel => {
                self.code.clear();
                self.panel.show_code("");
            }
            KeypadInput::Digit(_) => {
                if self.code.len() >= MAX_CODE_BUFFER {
                    return;
                }
                if let Some(c) = key.as_char() {
                    self.code.push(c);
                }
                let echo_end = self.code.len().min(CODE_ECHO_LENGTH);
                self.panel.show_code(&self.code[..echo_end]);
            }
        }
    }

    /// Validate the buffered code, act on it and record the audit event.
    async fn process_code(&mut self) {
        let code = std::mem::take(&mut self.code);
        let result = self.validator.validate(&code, &self.sync).await;
        self.ctx.watchdog().feed();
        debug!(%result, "Code checked");

        self.dispatch(&result).await;

        let snapshot = result
            .compartment()
            .and_then(|id| self.ctx.registry.get(id))
            .map(|compartment| compartment.snapshot());
        let event = AuditEvent::for_lookup(self.ctx.now(), &code, &result, snapshot);

        match (&result, event.compartment, snapshot) {
            (CodeLookupResult::MaintenanceAll, _, _) => {
                info!("Maintenance code to open all compartments was entered");
            }
            (_, Some(id), Some((content, door))) => info!(
                "Code '{}' was entered, valid for compartment {id}, content status: {content}, door status: {door}",
                event.code_entered
            ),
            _ => info!("Code '{}' was entered, invalid", event.code_entered),
        }

        self.sync.push_audit(&event).await;
        self.ctx.watchdog().feed();
        self.show_welcome();
    }

    async fn dispatch(&mut self, result: &CodeLookupResult) {
        match result {
            CodeLookupResult::Normal(id) | CodeLookupResult::Maintenance(id)
                if self.ctx.registry.contains(*id) =>
            {
                self.transaction(*id).await;
            }
            CodeLookupResult::Normal(id) | CodeLookupResult::Maintenance(id) => {
                warn!(compartment = %id, "Code valid for a compartment that is not connected");
                self.reject(Prompt::AbsentCompartment).await;
            }
            CodeLookupResult::MaintenanceAll => {
                self.panel.set_status_light(LedColor::Granted);
                self.panel.show_status(&Prompt::OpeningAll.to_string());
                self.open_all().await;
            }
            CodeLookupResult::MaintenanceUnassigned => {
                warn!("Maintenance code names no compartment");
                self.reject(Prompt::AbsentCompartment).await;
            }
            CodeLookupResult::Invalid => self.reject(Prompt::InvalidCode).await,
            CodeLookupResult::LookupFailed(_) => self.reject(Prompt::LookupFailed).await,
        }
    }

    async fn reject(&mut self, prompt: Prompt) {
        self.panel.set_status_light(LedColor::Rejected);
        self.panel.show_status(&prompt.to_string());
        tokio::time::sleep(self.notices.rejected).await;
    }

    /// Open one compartment, wait for it to close and ask about content.
    async fn transaction(&mut self, id: CompartmentId) {
        let Some(compartment) = self.ctx.registry.get(id) else {
            return;
        };
        let slots = compartment.slots().to_vec();
        let leds = compartment.leds().to_vec();
        let content_before = compartment.content_status;

        self.panel.set_compartment_lights(&leds, LedColor::Highlight);
        self.panel.set_status_light(LedColor::Granted);
        self.panel.show_status(&Prompt::Opening(id).to_string());
        tokio::time::sleep(self.notices.opening).await;
        self.ctx.watchdog().feed();

        let panel = &mut self.panel;
        let report = self
            .actuator
            .open(&mut self.locks, &slots, |attempt| {
                debug!(compartment = %id, attempt, "Retrying unlock");
                panel.show_status(&Prompt::DoorBlocked(id).to_string());
            })
            .await;
        self.ctx.watchdog().feed();

        let opened = match report {
            Ok(report) => report.opened,
            Err(e) => {
                error!(compartment = %id, error = %e, "Unlock cycle aborted");
                false
            }
        };

        if !opened {
            error!(compartment = %id, "Door did not open");
            self.set_door(id, DoorStatus::Closed);
            self.panel.show_status(&Prompt::DoorDidNotOpen.to_string());
            tokio::time::sleep(self.notices.door_failed).await;
            self.panel.set_compartment_lights(&leds, LedColor::Off);
            return;
        }

        self.panel.show_status(&Prompt::RemoveOrReturn(id).to_string());
        tokio::time::sleep(self.notices.opening).await;

        let close = self
            .actuator
            .wait_for_close(
                &mut self.locks,
                &slots,
                &mut self.keypad,
                self.ctx.watchdog(),
                self.actuator.policy().close_wait,
            )
            .await;
        match close {
            CloseOutcome::Closed => self.set_door(id, DoorStatus::Closed),
            CloseOutcome::TimedOut | CloseOutcome::Cancelled => {
                warn!(compartment = %id, "Door not closed");
                self.set_door(id, DoorStatus::Open);
            }
        }

        if self.ctx.flags.content_tracking {
            let content = if close == CloseOutcome::Cancelled {
                warn!(compartment = %id, "Content question skipped");
                ContentStatus::Unknown
            } else {
                self.ask_content(content_before).await
            };
            if let Some(compartment) = self.ctx.registry.get_mut(id) {
                compartment.content_status = content;
            }
        }

        self.panel.set_compartment_lights(&leds, LedColor::Off);
    }

    async fn ask_content(&mut self, before: ContentStatus) -> ContentStatus {
        let prompt = Prompt::ContentQuestion(before);
        self.panel.show_status(&prompt.to_string());
        self.panel.show_answer_icons(prompt.answer_icons());

        let answer = self
            .dialog
            .ask(&mut self.keypad, self.ctx.watchdog())
            .await;
        self.panel.show_answer_icons(AnswerIcons::Hidden);

        if answer == ContentAnswer::NoAnswer {
            warn!("User did not answer content question");
        }
        answer.apply(before)
    }

    fn set_door(&mut self, id: CompartmentId, status: DoorStatus) {
        if let Some(compartment) = self.ctx.registry.get_mut(id) {
            compartment.door_status = status;
        }
    }

    /// Single pulse on one compartment, recording what the sensors saw.
    async fn pulse_compartment(&mut self, id: CompartmentId) -> bool {
        let Some(compartment) = self.ctx.registry.get(id) else {
            return false;
        };
        let slots = compartment.slots().to_vec();
        let duration = self.actuator.policy().open_all;

        let opened = self.actuator.pulse(&mut self.locks, &slots, duration).await;
        self.set_door(id, if opened { DoorStatus::Open } else { DoorStatus::Closed });
        opened
    }

    /// Pulse every compartment once, feeding the watchdog in between.
    async fn open_all(&mut self) {
        for id in self.ctx.registry.ids() {
            if !self.pulse_compartment(id).await {
                warn!(compartment = %id, "Door did not open");
            }
            self.ctx.watchdog().feed();
        }
    }

    /// Compartments whose sensors currently read open.
    async fn open_compartments(&mut self) -> Vec<CompartmentId> {
        let mut open = Vec::new();
        for compartment in self.ctx.registry.iter() {
            if self.actuator.door_open(&mut self.locks, compartment.slots()).await {
                open.push(compartment.id());
            }
        }
        open
    }

    /// Act on one remote command message.
    pub async fn handle_command(&mut self, message: &str) -> Option<RestartReason> {
        let command: RemoteCommand = match message.parse() {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring remote command '{message}'");
                return None;
            }
        };
        info!(%command, "Remote command received");

        match command {
            RemoteCommand::Status(CommandTarget::All) => {
                let open: Vec<String> = self
                    .open_compartments()
                    .await
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                info!("Open compartments: [{}]", open.join(", "));
            }
            RemoteCommand::Status(CommandTarget::One(id)) => {
                let Some(compartment) = self.ctx.registry.get(id) else {
                    warn!(compartment = %id, "Status requested for absent compartment");
                    return None;
                };
                let (content, door) = compartment.snapshot();
                let slots = compartment.slots().to_vec();
                let sensor_open = self.actuator.door_open(&mut self.locks, &slots).await;
                info!(
                    compartment = %id,
                    sensor_open,
                    door = %door,
                    content = %content,
                    "Compartment status"
                );
            }
            RemoteCommand::Open(CommandTarget::All) => self.open_all().await,
            RemoteCommand::Open(CommandTarget::One(id)) => {
                if !self.ctx.registry.contains(id) {
                    warn!(compartment = %id, "Open requested for absent compartment");
                } else if !self.pulse_compartment(id).await {
                    warn!(compartment = %id, "Door did not open");
                }
            }
            RemoteCommand::Reset => {
                info!("Restart requested remotely");
                return Some(RestartReason::Remote);
            }
            RemoteCommand::TamperAlarm(enabled) => {
                self.ctx.flags.tamper_alarm = enabled;
                info!(enabled, "Tamper alarm switched");
            }
        }
        None
    }

    /// Poll the command channel and act on what arrived.
    pub async fn poll_commands(&mut self) -> Option<RestartReason> {
        let commands = self.commands.as_mut()?;
        let messages = match commands.poll_commands().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Error getting update from command broker");
                return None;
            }
        };

        for message in messages {
            if let Some(reason) = self.handle_command(&message).await {
                return Some(reason);
            }
        }
        None
    }

    /// Watchdog, brightness, indicators and error forwarding.
    pub async fn fast_tasks(&mut self) {
        self.ctx.watchdog().feed();
        self.update_brightness();
        self.update_supply();
        self.panel
            .set_indicator(Indicator::BackendUnreachable, !self.sync.backend_reachable());
        self.sync.drain_error_queue(self.ctx.uptime()).await;
    }

    /// Keepalive, battery check and the daily restart window.
    pub async fn slow_tasks(&mut self) -> Option<RestartReason> {
        let outcome = self
            .sync
            .push_status(&self.ctx.device_status(), &self.ctx.now())
            .await;
        self.panel
            .set_indicator(Indicator::BackendUnreachable, !outcome.is_delivered());

        if let Some(battery) = self.sensors.battery.as_mut() {
            match battery.cell_voltage() {
                Ok(volts) if volts < LOW_BATTERY_VOLTS => {
                    let percent = battery.cell_percent().unwrap_or(f32::NAN);
                    warn!("Battery low: {volts:.2}V, {percent:.1} %");
                    self.panel.set_indicator(Indicator::LowBattery, true);
                }
                Ok(_) => self.panel.set_indicator(Indicator::LowBattery, false),
                Err(e) => error!(error = %e, "Error reading battery"),
            }
        }

        let now = self.ctx.now();
        if now.hour() == DAILY_RESET_HOUR && self.ctx.uptime().as_secs() > RESET_UPTIME_FLOOR_SECS
        {
            info!("Daily restart window reached");
            return Some(RestartReason::Scheduled);
        }
        None
    }

    fn update_brightness(&mut self) {
        let Some(sensor) = self.sensors.light.as_mut() else {
            return;
        };
        match sensor.visible_light() {
            Ok(light) => self.panel.set_brightness(brightness_for(light)),
            Err(e) => error!(error = %e, "Error getting ambient brightness"),
        }
    }

    fn update_supply(&mut self) {
        if let Some(supply) = self.sensors.supply.as_mut() {
            let present = supply.supply_present();
            self.panel.set_indicator(Indicator::NoSupply, !present);
        }
    }

    fn check_tamper(&mut self) {
        if !self.ctx.flags.tamper_alarm {
            if self.tamper_alerting {
                self.tamper_alerting = false;
                self.panel.set_status_light(LedColor::Idle);
            }
            return;
        }
        let Some(motion) = self.sensors.motion.as_mut() else {
            return;
        };

        let (_, _, z) = match motion.acceleration() {
            Ok(reading) => reading,
            Err(e) => {
                debug!(error = %e, "Accelerometer read failed");
                return;
            }
        };
        let alert = z.abs() > TAMPER_ACCEL_THRESHOLD;
        // Re-asserted every tick so a transaction cannot paint over it.
        if alert {
            self.panel.set_status_light(LedColor::Rejected);
        }
        if alert == self.tamper_alerting {
            return;
        }

        self.tamper_alerting = alert;
        if alert {
            warn!(z, "Tamper alarm triggered");
        } else {
            info!("Tamper alarm cleared");
            self.panel.set_status_light(LedColor::Idle);
        }
    }

    fn show_welcome(&mut self) {
        self.panel.set_status_light(LedColor::Idle);
        self.panel.show_code("");
        self.panel.show_status(&Prompt::Welcome.to_string());
    }
}
