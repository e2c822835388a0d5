//! Code validation.
//!
//! Classifies an entered code by length and resolves it to a compartment:
//!
//! | Length | Shape | Resolution |
//! |--------|-------|------------|
//! | 4 | normal | Looked up in the code table, fetched fresh for every entry |
//! | 8 | maintenance | `<id:2><prefix:6>`, checked against the configured prefix offline |
//! | other | - | Invalid |
//!
//! The maintenance path never touches the network, so maintenance access
//! keeps working while the backend is unreachable.
//!
//! # Examples
//!
//! ```
//! use keybox_core::{CodeLookupResult, CodeTable, CompartmentId};
//! use keybox_engine::validator::{CodeSource, CodeValidator};
//!
//! struct Offline;
//!
//! impl CodeSource for Offline {
//!     async fn fetch_codes(&self) -> Result<CodeTable, String> {
//!         Err("offline".to_string())
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let validator = CodeValidator::new("000001");
//! let result = validator.validate("07000001", &Offline).await;
//! assert_eq!(result, CodeLookupResult::Maintenance(CompartmentId::new(7).unwrap()));
//!
//! let result = validator.validate("1234", &Offline).await;
//! assert!(matches!(result, CodeLookupResult::LookupFailed(_)));
//! # });
//! ```

#![allow(async_fn_in_trait)]

use keybox_core::constants::{MAINTENANCE_ID_RANGE, MAINTENANCE_PREFIX_RANGE};
use keybox_core::{
    CodeKind, CodeLookupResult, CodeMatch, CodeTable, CompartmentId, is_all_compartments,
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Where normal codes are looked up.
pub trait CodeSource {
    /// Fetch the current code table.
    ///
    /// Returns a human-readable reason on failure; it ends up in
    /// [`CodeLookupResult::LookupFailed`].
    async fn fetch_codes(&self) -> Result<CodeTable, String>;
}

/// Resolves entered codes to compartments.
#[derive(Debug, Clone)]
pub struct CodeValidator {
    maintenance_prefix: String,
}

impl CodeValidator {
    /// Validator for the given six-digit maintenance prefix.
    pub fn new(maintenance_prefix: impl Into<String>) -> Self {
        Self {
            maintenance_prefix: maintenance_prefix.into(),
        }
    }

    /// Resolve one entered code.
    ///
    /// Only four-digit codes reach `source`, exactly once per call.
    pub async fn validate<S: CodeSource>(&self, code: &str, source: &S) -> CodeLookupResult {
        if !code.bytes().all(|b| b.is_ascii_digit()) {
            return CodeLookupResult::Invalid;
        }

        match CodeKind::of(code) {
            CodeKind::Normal => self.validate_normal(code, source).await,
            CodeKind::Maintenance => self.validate_maintenance(code),
            CodeKind::Unsupported => {
                debug!(length = code.len(), "Code length not accepted");
                CodeLookupResult::Invalid
            }
        }
    }

    async fn validate_normal<S: CodeSource>(&self, code: &str, source: &S) -> CodeLookupResult {
        let table = match source.fetch_codes().await {
            Ok(table) => table,
            Err(reason) => return CodeLookupResult::LookupFailed(reason),
        };

        match table.find(code) {
            CodeMatch::None => CodeLookupResult::Invalid,
            CodeMatch::Unique(id) => CodeLookupResult::Normal(id),
            CodeMatch::Ambiguous(ids) => {
                let listed: Vec<String> = ids.iter().map(ToString::to_string).collect();
                warn!(
                    compartments = %listed.join(", "),
                    "Code listed under several compartments, using the lowest id"
                );
                // `find` returns ids in ascending order.
                match ids.first() {
                    Some(id) => CodeLookupResult::Normal(*id),
                    None => CodeLookupResult::Invalid,
                }
            }
        }
    }

    fn validate_maintenance(&self, code: &str) -> CodeLookupResult {
        let (Some(id_part), Some(prefix_part)) = (
            code.get(MAINTENANCE_ID_RANGE),
            code.get(MAINTENANCE_PREFIX_RANGE),
        ) else {
            return CodeLookupResult::Invalid;
        };

        let prefix_ok: bool = prefix_part
            .as_bytes()
            .ct_eq(self.maintenance_prefix.as_bytes())
            .into();
        if !prefix_ok {
            return CodeLookupResult::Invalid;
        }

        // Past this point the code carries the secret and must never be
        // reported as a plain invalid code.
        let Ok(raw_id) = id_part.parse::<u8>() else {
            return CodeLookupResult::MaintenanceUnassigned;
        };
        if is_all_compartments(raw_id) {
            return CodeLookupResult::MaintenanceAll;
        }
        match CompartmentId::new(raw_id) {
            Ok(id) => CodeLookupResult::Maintenance(id),
            Err(_) => CodeLookupResult::MaintenanceUnassigned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keybox_core::AccessCode;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed table and counts fetches.
    struct StubSource {
        table: Result<CodeTable, String>,
        fetches: AtomicUsize,
    }

    impl StubSource {
        fn with(entries: &[(u8, &str)]) -> Self {
            let mut table = CodeTable::new();
            for (id, code) in entries {
                table.insert(CompartmentId::new(*id).unwrap(), AccessCode::new(code).unwrap());
            }
            Self {
                table: Ok(table),
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                table: Err("timeout".to_string()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    impl CodeSource for StubSource {
        async fn fetch_codes(&self) -> Result<CodeTable, String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.table.clone()
        }
    }

    fn id(n: u8) -> CompartmentId {
        CompartmentId::new(n).unwrap()
    }

    fn validator() -> CodeValidator {
        CodeValidator::new("000001")
    }

    #[tokio::test]
    async fn test_normal_code_found() {
        let source = StubSource::with(&[(1, "1111"), (2, "1234"), (3, "9999")]);

        let result = validator().validate("1234", &source).await;

        assert_eq!(result, CodeLookupResult::Normal(id(2)));
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_normal_code_refetched_every_time() {
        let source = StubSource::with(&[(2, "1234")]);
        let validator = validator();

        validator.validate("1234", &source).await;
        validator.validate("1234", &source).await;

        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_normal_code_unknown() {
        let source = StubSource::with(&[(2, "1234")]);
        assert_eq!(
            validator().validate("4321", &source).await,
            CodeLookupResult::Invalid
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_is_reported() {
        let source = StubSource::failing();
        assert_eq!(
            validator().validate("1234", &source).await,
            CodeLookupResult::LookupFailed("timeout".to_string())
        );
    }

    #[tokio::test]
    async fn test_duplicate_code_uses_lowest_id() {
        let source = StubSource::with(&[(5, "1234"), (3, "1234")]);
        assert_eq!(
            validator().validate("1234", &source).await,
            CodeLookupResult::Normal(id(3))
        );
    }

    #[rstest]
    #[case("07000001", CodeLookupResult::Maintenance(id(7)))]
    #[case("98000001", CodeLookupResult::Maintenance(id(98)))]
    #[case("99000001", CodeLookupResult::MaintenanceAll)]
    #[case("00000001", CodeLookupResult::MaintenanceUnassigned)]
    #[case("07000002", CodeLookupResult::Invalid)]
    #[case("07100001", CodeLookupResult::Invalid)]
    #[tokio::test]
    async fn test_maintenance_codes_offline(
        #[case] code: &str,
        #[case] expected: CodeLookupResult,
    ) {
        let source = StubSource::failing();

        assert_eq!(validator().validate(code, &source).await, expected);
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_maintenance_code_for_unregistered_compartment_is_valid() {
        let source = StubSource::with(&[]);
        assert_eq!(
            validator().validate("42000001", &source).await,
            CodeLookupResult::Maintenance(id(42))
        );
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("123")]
    #[case("12345")]
    #[case("1234567")]
    #[case("12a4")]
    #[case("0700000a")]
    #[tokio::test]
    async fn test_other_shapes_invalid_without_lookup(#[case] code: &str) {
        let source = StubSource::with(&[(1, "1234")]);

        assert_eq!(validator().validate(code, &source).await, CodeLookupResult::Invalid);
        assert_eq!(source.fetches(), 0);
    }
}
