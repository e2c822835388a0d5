//! Inbound remote commands.
//!
//! The backend's command channel delivers plain text messages of the form
//! `"<verb> <arg>"`:
//!
//! | Message | Meaning |
//! |---------|---------|
//! | `status all` / `status N` | Log door and content state |
//! | `open all` / `open N` | Pulse the lock of one or every compartment |
//! | `reset` | Restart the device immediately |
//! | `tamper_alarm on` / `tamper_alarm off` | Toggle the tamper alarm flag |
//!
//! ```
//! use keybox_core::{CommandTarget, RemoteCommand};
//!
//! let cmd: RemoteCommand = "open all".parse().unwrap();
//! assert_eq!(cmd, RemoteCommand::Open(CommandTarget::All));
//! ```

use crate::{CompartmentId, Error, Result};
use std::fmt;
use std::str::FromStr;

/// Which compartments a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
    All,
    One(CompartmentId),
}

impl FromStr for CommandTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            return Ok(CommandTarget::All);
        }
        s.parse::<CompartmentId>()
            .map(CommandTarget::One)
            .map_err(|_| Error::InvalidCommand(format!("Invalid command target: {s}")))
    }
}

impl fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandTarget::All => write!(f, "all"),
            CommandTarget::One(id) => write!(f, "{id}"),
        }
    }
}

/// A parsed remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand {
    Status(CommandTarget),
    Open(CommandTarget),
    Reset,
    TamperAlarm(bool),
}

impl FromStr for RemoteCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();

        match parts.as_slice() {
            ["status", target] => Ok(RemoteCommand::Status(target.parse()?)),
            ["open", target] => Ok(RemoteCommand::Open(target.parse()?)),
            ["reset"] => Ok(RemoteCommand::Reset),
            ["tamper_alarm", "on"] => Ok(RemoteCommand::TamperAlarm(true)),
            ["tamper_alarm", "off"] => Ok(RemoteCommand::TamperAlarm(false)),
            _ => Err(Error::InvalidCommand(format!("Unrecognized command: {s}"))),
        }
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteCommand::Status(target) => write!(f, "status {target}"),
            RemoteCommand::Open(target) => write!(f, "open {target}"),
            RemoteCommand::Reset => write!(f, "reset"),
            RemoteCommand::TamperAlarm(true) => write!(f, "tamper_alarm on"),
            RemoteCommand::TamperAlarm(false) => write!(f, "tamper_alarm off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn one(id: u8) -> CommandTarget {
        CommandTarget::One(CompartmentId::new(id).unwrap())
    }

    #[rstest]
    #[case("status all", RemoteCommand::Status(CommandTarget::All))]
    #[case("status 3", RemoteCommand::Status(one(3)))]
    #[case("open all", RemoteCommand::Open(CommandTarget::All))]
    #[case("open 12", RemoteCommand::Open(one(12)))]
    #[case("reset", RemoteCommand::Reset)]
    #[case("tamper_alarm on", RemoteCommand::TamperAlarm(true))]
    #[case("tamper_alarm off", RemoteCommand::TamperAlarm(false))]
    fn test_parse_valid(#[case] input: &str, #[case] expected: RemoteCommand) {
        assert_eq!(input.parse::<RemoteCommand>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("open")]
    #[case("open 0")]
    #[case("open 1 2")]
    #[case("reset now")]
    #[case("tamper_alarm maybe")]
    #[case("launch all")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(input.parse::<RemoteCommand>().is_err());
    }

    #[test]
    fn test_display_round_trips_text() {
        assert_eq!(RemoteCommand::Open(one(4)).to_string(), "open 4");
        assert_eq!(RemoteCommand::TamperAlarm(false).to_string(), "tamper_alarm off");
    }
}
