use crate::{
    Result,
    constants::{
        ALL_COMPARTMENTS_ID, MAINTENANCE_CODE_LENGTH, MAINTENANCE_CODE_SENTINEL,
        MAX_CODE_BUFFER, MAX_COMPARTMENT_ID, MIN_COMPARTMENT_ID, NORMAL_CODE_LENGTH,
    },
    error::Error,
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

/// Compartment identifier (1-98, contiguous per detected hardware row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompartmentId(u8);

impl CompartmentId {
    /// Create a new compartment ID with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCompartment` if the ID is outside the valid range (1-98).
    pub fn new(id: u8) -> Result<Self> {
        if !(MIN_COMPARTMENT_ID..=MAX_COMPARTMENT_ID).contains(&id) {
            return Err(Error::InvalidCompartment(format!(
                "Compartment ID must be {MIN_COMPARTMENT_ID}-{MAX_COMPARTMENT_ID}, got {id}"
            )));
        }
        Ok(CompartmentId(id))
    }

    /// Get the raw compartment ID as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Zero-based position of this compartment in an id-ordered table.
    #[must_use]
    pub fn index(&self) -> usize {
        usize::from(self.0 - MIN_COMPARTMENT_ID)
    }

    /// Format the compartment ID as a zero-padded 2-digit string, the way it
    /// appears inside maintenance codes.
    #[must_use]
    pub fn to_string_padded(&self) -> String {
        format!("{:02}", self.0)
    }
}

impl fmt::Display for CompartmentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CompartmentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::InvalidCompartment(format!("Invalid compartment ID: {s}")))?;
        CompartmentId::new(id)
    }
}

impl TryFrom<u8> for CompartmentId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        CompartmentId::new(value)
    }
}

impl From<CompartmentId> for u8 {
    fn from(id: CompartmentId) -> Self {
        id.0
    }
}

/// Shape of an access code, decided purely by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// Four digits, resolved through the remote code table.
    Normal,
    /// Eight digits: compartment id followed by the secret prefix.
    Maintenance,
    /// Any other length.
    Unsupported,
}

impl CodeKind {
    /// Classify a raw code by length.
    #[inline]
    #[must_use]
    pub fn of(code: &str) -> Self {
        match code.len() {
            NORMAL_CODE_LENGTH => CodeKind::Normal,
            MAINTENANCE_CODE_LENGTH => CodeKind::Maintenance,
            _ => CodeKind::Unsupported,
        }
    }
}

/// Numeric access code as entered on the keypad or issued by the backend.
///
/// # Security
/// Comparison is constant-time so a code lookup does not leak how many
/// leading digits matched.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    /// Create a new access code with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCode` if the code is empty, longer than the
    /// keypad buffer, or contains anything but ASCII digits.
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();

        if code.is_empty() || code.len() > MAX_CODE_BUFFER {
            return Err(Error::InvalidCode(format!(
                "Code must be 1-{MAX_CODE_BUFFER} digits, got {}",
                code.len()
            )));
        }

        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidCode("Code must be numeric".to_string()));
        }

        Ok(AccessCode(code.to_string()))
    }

    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shape of this code.
    #[must_use]
    pub fn kind(&self) -> CodeKind {
        CodeKind::of(&self.0)
    }

    /// Constant-time comparison against a raw keypad entry.
    #[must_use]
    pub fn matches(&self, entered: &str) -> bool {
        self.0.as_bytes().ct_eq(entered.as_bytes()).into()
    }
}

impl PartialEq for AccessCode {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        AccessCode::new(&value)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

/// Door state as last established by an actuation or explicit poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorStatus {
    Closed,
    /// Door left open after the close-wait expired; a fault condition.
    Open,
    Error,
}

impl fmt::Display for DoorStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DoorStatus::Closed => write!(f, "closed"),
            DoorStatus::Open => write!(f, "open"),
            DoorStatus::Error => write!(f, "error"),
        }
    }
}

/// What the device believes is inside a compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Present,
    Empty,
    Unknown,
}

impl ContentStatus {
    /// Content after the user confirms they took out or put in the content.
    ///
    /// `Unknown` toggles like `Empty`.
    #[inline]
    #[must_use]
    pub fn after_confirm(self) -> Self {
        match self {
            ContentStatus::Present => ContentStatus::Empty,
            ContentStatus::Empty | ContentStatus::Unknown => ContentStatus::Present,
        }
    }

    /// Content after the user declines (nothing taken, nothing returned).
    #[inline]
    #[must_use]
    pub fn after_decline(self) -> Self {
        match self {
            ContentStatus::Present => ContentStatus::Present,
            ContentStatus::Empty | ContentStatus::Unknown => ContentStatus::Empty,
        }
    }

    /// Returns `true` if the content is known.
    #[inline]
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, ContentStatus::Unknown)
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContentStatus::Present => write!(f, "present"),
            ContentStatus::Empty => write!(f, "empty"),
            ContentStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of validating one entered code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeLookupResult {
    /// A normal code found in the remote table.
    Normal(CompartmentId),
    /// A maintenance code addressing one compartment, which may not exist.
    Maintenance(CompartmentId),
    /// A maintenance code addressing every compartment.
    MaintenanceAll,
    /// A maintenance code with the right prefix whose id part names no
    /// compartment (`00`).
    MaintenanceUnassigned,
    /// The code is malformed, unknown, or carries the wrong prefix.
    Invalid,
    /// The remote code table could not be fetched.
    LookupFailed(String),
}

impl CodeLookupResult {
    /// Target compartment, if the result names exactly one.
    #[must_use]
    pub fn compartment(&self) -> Option<CompartmentId> {
        match self {
            CodeLookupResult::Normal(id) | CodeLookupResult::Maintenance(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns `true` whenever the maintenance prefix matched.
    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        matches!(
            self,
            CodeLookupResult::Maintenance(_)
                | CodeLookupResult::MaintenanceAll
                | CodeLookupResult::MaintenanceUnassigned
        )
    }
}

impl fmt::Display for CodeLookupResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodeLookupResult::Normal(id) => write!(f, "normal code for compartment {id}"),
            CodeLookupResult::Maintenance(id) => {
                write!(f, "maintenance code for compartment {id}")
            }
            CodeLookupResult::MaintenanceAll => write!(f, "maintenance code for all compartments"),
            CodeLookupResult::MaintenanceUnassigned => {
                write!(f, "maintenance code for no compartment")
            }
            CodeLookupResult::Invalid => write!(f, "invalid code"),
            CodeLookupResult::LookupFailed(reason) => write!(f, "code lookup failed: {reason}"),
        }
    }
}

/// Result of scanning the code table for one code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeMatch {
    None,
    Unique(CompartmentId),
    /// The code is listed under several compartments, in ascending id order.
    Ambiguous(Vec<CompartmentId>),
}

/// Valid normal codes per compartment, as fetched from the backend.
///
/// Ordered by compartment id so "first match" is well defined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    entries: BTreeMap<CompartmentId, Vec<AccessCode>>,
}

impl CodeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the backend's raw `{ "<id>": ["<code>", ...] }` shape.
    ///
    /// Entries whose key is not a compartment id or whose code is malformed
    /// are skipped; their descriptions are returned alongside the table.
    pub fn from_raw<I, C>(raw: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (String, C)>,
        C: IntoIterator<Item = String>,
    {
        let mut table = CodeTable::new();
        let mut skipped = Vec::new();

        for (key, codes) in raw {
            let id = match key.parse::<CompartmentId>() {
                Ok(id) => id,
                Err(_) => {
                    skipped.push(format!("compartment key '{key}'"));
                    continue;
                }
            };
            for code in codes {
                match AccessCode::new(&code) {
                    Ok(code) => table.insert(id, code),
                    Err(_) => skipped.push(format!("malformed code under compartment {id}")),
                }
            }
        }

        (table, skipped)
    }

    /// Add a code for a compartment.
    pub fn insert(&mut self, compartment: CompartmentId, code: AccessCode) {
        self.entries.entry(compartment).or_default().push(code);
    }

    /// Number of compartments with at least one code.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no compartment has a code.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find every compartment listing `code`.
    ///
    /// Every entry is compared so lookup time does not depend on where the
    /// code sits in the table.
    pub fn find(&self, code: &str) -> CodeMatch {
        let mut hits: Vec<CompartmentId> = Vec::new();
        for (id, codes) in &self.entries {
            let listed = codes
                .iter()
                .fold(false, |found, candidate| candidate.matches(code) | found);
            if listed {
                hits.push(*id);
            }
        }

        match hits.len() {
            0 => CodeMatch::None,
            1 => CodeMatch::Unique(hits[0]),
            _ => CodeMatch::Ambiguous(hits),
        }
    }
}

/// One audit record per confirmed code entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Local>,

    /// Entered code, or [`MAINTENANCE_CODE_SENTINEL`] for maintenance codes.
    pub code_entered: String,

    pub compartment: Option<CompartmentId>,

    pub content: Option<ContentStatus>,

    pub door: Option<DoorStatus>,
}

impl AuditEvent {
    /// Build the audit record for a finished transaction.
    ///
    /// `snapshot` is the compartment state after the transaction was
    /// finalized, or `None` when the target compartment is not registered.
    pub fn for_lookup(
        timestamp: DateTime<Local>,
        code: &str,
        result: &CodeLookupResult,
        snapshot: Option<(ContentStatus, DoorStatus)>,
    ) -> Self {
        let code_entered = if result.is_maintenance() {
            MAINTENANCE_CODE_SENTINEL.to_string()
        } else {
            code.to_string()
        };

        Self {
            timestamp,
            code_entered,
            compartment: result.compartment(),
            content: snapshot.map(|(content, _)| content),
            door: snapshot.map(|(_, door)| door),
        }
    }
}

/// Keepalive payload describing the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub uptime: Duration,
    pub serial: String,
    pub version: String,
    pub compartment_count: usize,

    /// Slot positions configured as large compartments.
    pub large_compartments: Vec<usize>,
}

/// Returns `true` if `id` is the maintenance "all compartments" sentinel.
#[inline]
#[must_use]
pub fn is_all_compartments(id: u8) -> bool {
    id == ALL_COMPARTMENTS_ID
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("1", 1)]
    #[case("07", 7)]
    #[case("98", 98)]
    fn test_compartment_id_valid(#[case] input: &str, #[case] expected: u8) {
        let id: CompartmentId = input.parse().unwrap();
        assert_eq!(id.as_u8(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("99")]
    #[case("abc")]
    #[case("")]
    fn test_compartment_id_invalid(#[case] input: &str) {
        let result: Result<CompartmentId> = input.parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_compartment_id_display() {
        let id = CompartmentId::new(7).unwrap();
        assert_eq!(id.to_string(), "7");
        assert_eq!(id.to_string_padded(), "07");
        assert_eq!(id.index(), 6);
    }

    #[test]
    fn test_compartment_id_serde_as_number() {
        let id = CompartmentId::new(12).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "12");
        assert!(serde_json::from_str::<CompartmentId>("0").is_err());
    }

    #[rstest]
    #[case("1234", CodeKind::Normal)]
    #[case("07000001", CodeKind::Maintenance)]
    #[case("123", CodeKind::Unsupported)]
    #[case("123456", CodeKind::Unsupported)]
    #[case("", CodeKind::Unsupported)]
    fn test_code_kind(#[case] code: &str, #[case] kind: CodeKind) {
        assert_eq!(CodeKind::of(code), kind);
    }

    #[rstest]
    #[case("")]
    #[case("12a4")]
    #[case("123456789")]
    fn test_access_code_invalid(#[case] input: &str) {
        assert!(AccessCode::new(input).is_err());
    }

    #[test]
    fn test_access_code_constant_time_eq() {
        let a = AccessCode::new("1234").unwrap();
        let b = AccessCode::new("1234").unwrap();
        let c = AccessCode::new("1235").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.matches("1234"));
        assert!(!a.matches("123"));
    }

    #[rstest]
    #[case(ContentStatus::Present, ContentStatus::Empty, ContentStatus::Present)]
    #[case(ContentStatus::Empty, ContentStatus::Present, ContentStatus::Empty)]
    #[case(ContentStatus::Unknown, ContentStatus::Present, ContentStatus::Empty)]
    fn test_content_toggles(
        #[case] before: ContentStatus,
        #[case] confirmed: ContentStatus,
        #[case] declined: ContentStatus,
    ) {
        assert_eq!(before.after_confirm(), confirmed);
        assert_eq!(before.after_decline(), declined);
    }

    #[test]
    fn test_code_table_from_raw_skips_garbage() {
        let raw = vec![
            ("2".to_string(), vec!["1234".to_string(), "x1".to_string()]),
            ("zero".to_string(), vec!["5555".to_string()]),
        ];
        let (table, skipped) = CodeTable::from_raw(raw);

        assert_eq!(table.len(), 1);
        assert_eq!(skipped.len(), 2);
        assert_eq!(
            table.find("1234"),
            CodeMatch::Unique(CompartmentId::new(2).unwrap())
        );
    }

    #[test]
    fn test_code_table_orders_numerically() {
        let mut table = CodeTable::new();
        table.insert(CompartmentId::new(10).unwrap(), AccessCode::new("4321").unwrap());
        table.insert(CompartmentId::new(2).unwrap(), AccessCode::new("4321").unwrap());

        assert_eq!(
            table.find("4321"),
            CodeMatch::Ambiguous(vec![
                CompartmentId::new(2).unwrap(),
                CompartmentId::new(10).unwrap()
            ])
        );
        assert_eq!(table.find("0000"), CodeMatch::None);
    }

    #[test]
    fn test_audit_event_hides_maintenance_code() {
        let ts = Local.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let id = CompartmentId::new(7).unwrap();

        let event = AuditEvent::for_lookup(
            ts,
            "07000001",
            &CodeLookupResult::Maintenance(id),
            Some((ContentStatus::Empty, DoorStatus::Closed)),
        );
        assert_eq!(event.code_entered, MAINTENANCE_CODE_SENTINEL);
        assert_eq!(event.compartment, Some(id));
        assert_eq!(event.content, Some(ContentStatus::Empty));
        assert_eq!(event.door, Some(DoorStatus::Closed));

        let unassigned = AuditEvent::for_lookup(
            ts,
            "00000001",
            &CodeLookupResult::MaintenanceUnassigned,
            None,
        );
        assert_eq!(unassigned.code_entered, MAINTENANCE_CODE_SENTINEL);
        assert_eq!(unassigned.compartment, None);

        let invalid = AuditEvent::for_lookup(ts, "99", &CodeLookupResult::Invalid, None);
        assert_eq!(invalid.code_entered, "99");
        assert_eq!(invalid.compartment, None);
        assert_eq!(invalid.door, None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DoorStatus::Open.to_string(), "open");
        assert_eq!(ContentStatus::Unknown.to_string(), "unknown");
        assert_eq!(
            serde_json::to_string(&DoorStatus::Closed).unwrap(),
            "\"closed\""
        );
    }
}
