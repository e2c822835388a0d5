//! Texts shown on the front panel.
//!
//! The status area fits about three lines of 26 characters, so longer texts
//! carry explicit line breaks.

use keybox_core::{CompartmentId, ContentStatus};
use keybox_hardware::AnswerIcons;
use std::fmt;

/// A user-facing prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Welcome,
    Opening(CompartmentId),
    RemoveOrReturn(CompartmentId),
    DoorBlocked(CompartmentId),
    DoorDidNotOpen,

    /// Content question; wording depends on what the compartment held.
    ContentQuestion(ContentStatus),

    OpeningAll,
    AbsentCompartment,
    InvalidCode,
    LookupFailed,
}

impl Prompt {
    /// Answer icons to show alongside this prompt.
    pub fn answer_icons(&self) -> AnswerIcons {
        match self {
            Prompt::ContentQuestion(ContentStatus::Unknown) => AnswerIcons::ReturnedOrTaken,
            Prompt::ContentQuestion(_) => AnswerIcons::NoYes,
            _ => AnswerIcons::Hidden,
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prompt::Welcome => write!(f, "Enter your code\nand press ✓."),
            Prompt::Opening(id) => write!(f, "Compartment {id} is opening."),
            Prompt::RemoveOrReturn(id) => write!(
                f,
                "Please remove or return\nthe content and close\ncompartment {id}."
            ),
            Prompt::DoorBlocked(id) => write!(
                f,
                "Compartment blocked?\nPlease press lightly\non compartment {id}."
            ),
            Prompt::DoorDidNotOpen => write!(
                f,
                "Compartment does not open.\nPlease try again\nor book an alternative."
            ),
            Prompt::ContentQuestion(ContentStatus::Present) => {
                write!(f, "Did you take out\nthe content?\n  No:        Yes:")
            }
            Prompt::ContentQuestion(ContentStatus::Empty) => {
                write!(f, "Did you put in\nthe content?\n  No:        Yes:")
            }
            Prompt::ContentQuestion(ContentStatus::Unknown) => {
                write!(f, "Did you return (✓)\nor take out (x)\nsomething?")
            }
            Prompt::OpeningAll => write!(f, "All compartments\nare opening."),
            Prompt::AbsentCompartment => write!(
                f,
                "Code is for a compartment\nthat is not connected\nor set up."
            ),
            Prompt::InvalidCode => write!(f, "Invalid code."),
            Prompt::LookupFailed => {
                write!(f, "Codes could not be checked.\nPlease try again later.")
            }
        }
    }
}
