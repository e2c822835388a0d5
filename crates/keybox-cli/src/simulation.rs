//! Simulated locker hardware for running the controller on a host.
//!
//! Keys are read from stdin (digits, `#` to confirm, `x` to cancel), the
//! front panel prints to stdout, and doors spring open when unlocked and
//! close again after a configurable time.

use keybox_core::constants::SLOTS_PER_ROW;
use keybox_engine::Sensors;
use keybox_engine::config::DeviceConfig;
use keybox_hardware::mock::{MockAmbient, MockKeypad, MockLockBank};
use keybox_hardware::{AnswerIcons, FrontPanel, Indicator, KeypadInput, LedColor};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// Delay between unlocking and a simulated door springing open.
const DOOR_SPRING_DELAY: Duration = Duration::from_millis(200);

/// Rows needed to fit the configured compartments.
///
/// Every large compartment covers three slot positions beyond its own.
pub fn rows_for(device: &DeviceConfig) -> usize {
    let positions = device.compartments + 3 * device.large_compartments.len();
    positions.div_ceil(SLOTS_PER_ROW).max(1)
}

/// Lock bank whose doors close by themselves after `close_after`.
pub fn lock_bank(rows: usize, close_after: Duration) -> MockLockBank {
    let (bank, handle) = MockLockBank::new(rows);
    handle.set_default_behavior(DOOR_SPRING_DELAY, Some(close_after));
    bank
}

/// Daylight, full battery, mains present, no motion.
pub fn sensors() -> Sensors {
    let ambient = MockAmbient::new();
    Sensors {
        light: Some(Box::new(ambient.light_sensor())),
        battery: Some(Box::new(ambient.battery())),
        supply: Some(Box::new(ambient.supply())),
        motion: Some(Box::new(ambient.motion_sensor())),
    }
}

/// Keypad fed from stdin, one line at a time.
pub fn stdin_keypad() -> MockKeypad {
    let (keypad, handle) = MockKeypad::new();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            for input in line.chars().filter_map(KeypadInput::from_char) {
                if handle.tap(input).await.is_err() {
                    return;
                }
            }
        }
        debug!("Keyboard input closed");
    });
    keypad
}

/// Front panel rendered as lines on stdout.
///
/// Only changes are printed.
#[derive(Debug)]
pub struct ConsolePanel {
    status: String,
    code: String,
    indicators: HashSet<Indicator>,
    status_light: LedColor,
    brightness: f32,
}

impl Default for ConsolePanel {
    fn default() -> Self {
        Self {
            status: String::new(),
            code: String::new(),
            indicators: HashSet::new(),
            status_light: LedColor::Off,
            brightness: 1.0,
        }
    }
}

impl FrontPanel for ConsolePanel {
    fn show_status(&mut self, text: &str) {
        if self.status != text {
            self.status = text.to_string();
            println!("[display] {}", text.replace('\n', " "));
        }
    }

    fn show_code(&mut self, code: &str) {
        if self.code != code {
            self.code = code.to_string();
            println!("[code] {code}");
        }
    }

    fn show_log(&mut self, lines: &[String]) {
        for line in lines {
            println!("[display log] {line}");
        }
    }

    fn show_answer_icons(&mut self, icons: AnswerIcons) {
        match icons {
            AnswerIcons::Hidden => {}
            AnswerIcons::ReturnedOrTaken => println!("[keys] # returned   x taken"),
            AnswerIcons::NoYes => println!("[keys] x no   # yes"),
        }
    }

    fn set_indicator(&mut self, indicator: Indicator, active: bool) {
        let changed = if active {
            self.indicators.insert(indicator)
        } else {
            self.indicators.remove(&indicator)
        };
        if changed {
            println!("[indicator] {indicator:?} {}", if active { "on" } else { "off" });
        }
    }

    fn set_brightness(&mut self, level: f32) {
        if (self.brightness - level).abs() >= 0.05 {
            println!("[backlight] {:.0} %", level * 100.0);
        }
        self.brightness = level;
    }

    fn set_status_light(&mut self, color: LedColor) {
        if self.status_light != color {
            self.status_light = color;
            println!("[light] status {color:?}");
        }
    }

    fn set_compartment_lights(&mut self, leds: &[usize], color: LedColor) {
        println!("[light] leds {leds:?} {color:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(8, vec![], 1)]
    #[case(9, vec![], 2)]
    #[case(13, vec![5], 2)]
    #[case(16, vec![], 2)]
    #[case(16, vec![5], 3)]
    #[case(0, vec![], 1)]
    fn test_rows_for(#[case] compartments: usize, #[case] large: Vec<usize>, #[case] rows: usize) {
        let device = DeviceConfig {
            compartments,
            large_compartments: large,
            ..DeviceConfig::default()
        };
        assert_eq!(rows_for(&device), rows);
    }

    #[test]
    fn test_console_panel_tracks_state() {
        let mut panel = ConsolePanel::default();
        panel.set_brightness(0.4);
        panel.set_indicator(Indicator::LowBattery, true);

        assert!((panel.brightness - 0.4).abs() < f32::EPSILON);
        assert!(panel.indicators.contains(&Indicator::LowBattery));

        panel.set_indicator(Indicator::LowBattery, false);
        assert!(panel.indicators.is_empty());
    }
}
