//! Recording front panel for tests.

use crate::{
    traits::FrontPanel,
    types::{AnswerIcons, Indicator, LedColor},
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
struct PanelState {
    statuses: Vec<String>,
    code: String,
    log: Vec<String>,
    icons: AnswerIcons,
    indicators: HashSet<Indicator>,
    brightness: f32,
    status_light: LedColor,
    compartment_lights: HashMap<usize, LedColor>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            code: String::new(),
            log: Vec::new(),
            icons: AnswerIcons::Hidden,
            indicators: HashSet::new(),
            brightness: 1.0,
            status_light: LedColor::Off,
            compartment_lights: HashMap::new(),
        }
    }
}

fn lock(state: &Mutex<PanelState>) -> MutexGuard<'_, PanelState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Front panel that records everything shown on it.
#[derive(Debug)]
pub struct MockPanel {
    state: Arc<Mutex<PanelState>>,
}

impl MockPanel {
    pub fn new() -> (Self, MockPanelHandle) {
        let state = Arc::new(Mutex::new(PanelState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockPanelHandle { state },
        )
    }
}

impl FrontPanel for MockPanel {
    fn show_status(&mut self, text: &str) {
        lock(&self.state).statuses.push(text.to_string());
    }

    fn show_code(&mut self, code: &str) {
        lock(&self.state).code = code.to_string();
    }

    fn show_log(&mut self, lines: &[String]) {
        lock(&self.state).log = lines.to_vec();
    }

    fn show_answer_icons(&mut self, icons: AnswerIcons) {
        lock(&self.state).icons = icons;
    }

    fn set_indicator(&mut self, indicator: Indicator, active: bool) {
        let mut state = lock(&self.state);
        if active {
            state.indicators.insert(indicator);
        } else {
            state.indicators.remove(&indicator);
        }
    }

    fn set_brightness(&mut self, level: f32) {
        lock(&self.state).brightness = level;
    }

    fn set_status_light(&mut self, color: LedColor) {
        lock(&self.state).status_light = color;
    }

    fn set_compartment_lights(&mut self, leds: &[usize], color: LedColor) {
        let mut state = lock(&self.state);
        for led in leds {
            state.compartment_lights.insert(*led, color);
        }
    }
}

/// Inspection handle for a [`MockPanel`].
#[derive(Debug, Clone)]
pub struct MockPanelHandle {
    state: Arc<Mutex<PanelState>>,
}

impl MockPanelHandle {
    /// Every status text shown so far, oldest first.
    pub fn statuses(&self) -> Vec<String> {
        lock(&self.state).statuses.clone()
    }

    /// Most recent status text.
    pub fn last_status(&self) -> Option<String> {
        lock(&self.state).statuses.last().cloned()
    }

    /// Returns `true` if any status text so far contained `needle`.
    pub fn has_shown(&self, needle: &str) -> bool {
        lock(&self.state)
            .statuses
            .iter()
            .any(|s| s.contains(needle))
    }

    pub fn code(&self) -> String {
        lock(&self.state).code.clone()
    }

    pub fn log_lines(&self) -> Vec<String> {
        lock(&self.state).log.clone()
    }

    pub fn answer_icons(&self) -> AnswerIcons {
        lock(&self.state).icons
    }

    pub fn indicator(&self, indicator: Indicator) -> bool {
        lock(&self.state).indicators.contains(&indicator)
    }

    pub fn brightness(&self) -> f32 {
        lock(&self.state).brightness
    }

    pub fn status_light(&self) -> LedColor {
        lock(&self.state).status_light
    }

    pub fn compartment_light(&self, led: usize) -> LedColor {
        lock(&self.state)
            .compartment_lights
            .get(&led)
            .copied()
            .unwrap_or(LedColor::Off)
    }
}
