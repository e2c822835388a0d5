//! JSON bodies exchanged with the backend.
//!
//! The backend expects every scalar as a string and timestamps in the
//! `YYYY-MM-DD_HH-MM-SS` local-time form.

use chrono::{DateTime, Local};
use keybox_core::{AuditEvent, CodeTable, DeviceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Timestamp format understood by the backend.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Format a local timestamp for the backend.
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Body of `PUT /{id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub time: String,
    /// Whole seconds since boot.
    pub uptime: String,
    pub serial: String,
    pub version: String,
    pub compartments: String,
    /// Slot positions in list notation, e.g. `[5, 13]`.
    pub large_compartments: String,
}

impl StatusPayload {
    pub fn new(status: &DeviceStatus, now: &DateTime<Local>) -> Self {
        let positions: Vec<String> = status
            .large_compartments
            .iter()
            .map(ToString::to_string)
            .collect();

        Self {
            time: format_timestamp(now),
            uptime: status.uptime.as_secs().to_string(),
            serial: status.serial.clone(),
            version: status.version.clone(),
            compartments: status.compartment_count.to_string(),
            large_compartments: format!("[{}]", positions.join(", ")),
        }
    }
}

/// Body of `POST /{id}/code_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditPayload {
    pub time: String,
    pub code_entered: String,
    /// `null` when the code resolved to no single compartment.
    pub compartment: Option<String>,
    pub content: Option<String>,
    pub door: Option<String>,
}

impl From<&AuditEvent> for AuditPayload {
    fn from(event: &AuditEvent) -> Self {
        Self {
            time: format_timestamp(&event.timestamp),
            code_entered: event.code_entered.clone(),
            compartment: event.compartment.map(|id| id.to_string()),
            content: event.content.map(|c| c.to_string()),
            door: event.door.map(|d| d.to_string()),
        }
    }
}

/// Body of `POST /{id}/error_log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogPayload {
    pub time: String,
    pub uptime: String,
    pub level: String,
    pub message: String,
}

impl ErrorLogPayload {
    pub fn new(now: &DateTime<Local>, uptime: Duration, level: &str, message: &str) -> Self {
        Self {
            time: format_timestamp(now),
            uptime: uptime.as_secs().to_string(),
            level: level.to_string(),
            message: message.to_string(),
        }
    }
}

/// Response body of `GET /{id}/codes`: compartment id to its valid codes.
pub type CodesResponse = HashMap<String, Vec<String>>;

/// Convert a codes response into a [`CodeTable`], logging skipped entries.
pub fn code_table_from_response(raw: CodesResponse) -> CodeTable {
    let (table, skipped) = CodeTable::from_raw(raw);
    for entry in skipped {
        tracing::warn!("Ignoring {} in code table", entry);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use keybox_core::{CodeLookupResult, CodeMatch, CompartmentId, ContentStatus, DoorStatus};

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 7, 12, 4, 9).unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(&noon()), "2025-03-07_12-04-09");
    }

    #[test]
    fn test_status_payload_all_strings() {
        let status = DeviceStatus {
            uptime: Duration::from_millis(360_500),
            serial: "SK-0042".to_string(),
            version: "0.1.0".to_string(),
            compartment_count: 14,
            large_compartments: vec![5, 13],
        };
        let payload = StatusPayload::new(&status, &noon());
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["uptime"], "360");
        assert_eq!(json["compartments"], "14");
        assert_eq!(json["large_compartments"], "[5, 13]");
        assert_eq!(json["time"], "2025-03-07_12-04-09");
    }

    #[test]
    fn test_audit_payload_snapshot() {
        let id = CompartmentId::new(2).unwrap();
        let event = AuditEvent::for_lookup(
            noon(),
            "1234",
            &CodeLookupResult::Normal(id),
            Some((ContentStatus::Empty, DoorStatus::Closed)),
        );
        let payload = AuditPayload::from(&event);

        assert_eq!(payload.code_entered, "1234");
        assert_eq!(payload.compartment.as_deref(), Some("2"));
        assert_eq!(payload.content.as_deref(), Some("empty"));
        assert_eq!(payload.door.as_deref(), Some("closed"));
    }

    #[test]
    fn test_audit_payload_without_compartment_is_null() {
        let event = AuditEvent::for_lookup(noon(), "5555", &CodeLookupResult::Invalid, None);
        let json = serde_json::to_value(AuditPayload::from(&event)).unwrap();

        assert!(json["compartment"].is_null());
        assert!(json["content"].is_null());
        assert!(json["door"].is_null());
    }

    #[test]
    fn test_codes_response_to_table() {
        let raw: CodesResponse =
            serde_json::from_str(r#"{"1": ["1111"], "2": ["1234", "9876"], "x": ["0000"]}"#)
                .unwrap();
        let table = code_table_from_response(raw);

        assert_eq!(table.len(), 2);
        assert_eq!(table.find("9876"), CodeMatch::Unique(CompartmentId::new(2).unwrap()));
    }
}
