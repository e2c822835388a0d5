//! Property-based tests for code classification.

use futures::executor::block_on;
use keybox_core::{AccessCode, CodeLookupResult, CodeTable, CompartmentId};
use keybox_engine::{CodeSource, CodeValidator};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

const PREFIX: &str = "480193";

/// Serves a fixed table and counts fetches.
struct CountingSource {
    table: CodeTable,
    fetches: AtomicUsize,
}

impl CountingSource {
    fn new() -> Self {
        let mut table = CodeTable::new();
        table.insert(CompartmentId::new(2).unwrap(), AccessCode::new("2468").unwrap());
        Self {
            table,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl CodeSource for CountingSource {
    async fn fetch_codes(&self) -> Result<CodeTable, String> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.table.clone())
    }
}

/// Digit strings of any length except the two supported ones.
fn unsupported_length_code() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9]{0,12}")
        .expect("Failed to create code regex strategy")
        .prop_filter("supported length", |code| code.len() != 4 && code.len() != 8)
}

proptest! {
    #[test]
    fn prop_unsupported_lengths_are_invalid_offline(code in unsupported_length_code()) {
        let source = CountingSource::new();
        let result = block_on(CodeValidator::new(PREFIX).validate(&code, &source));

        prop_assert_eq!(result, CodeLookupResult::Invalid);
        prop_assert_eq!(source.fetches.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn prop_normal_codes_fetch_exactly_once(code in "[0-9]{4}") {
        let source = CountingSource::new();
        let result = block_on(CodeValidator::new(PREFIX).validate(&code, &source));

        prop_assert_eq!(source.fetches.load(Ordering::Relaxed), 1);
        if code == "2468" {
            prop_assert_eq!(result, CodeLookupResult::Normal(CompartmentId::new(2).unwrap()));
        } else {
            prop_assert_eq!(result, CodeLookupResult::Invalid);
        }
    }

    #[test]
    fn prop_maintenance_codes_resolve_offline(id in 1u8..=98) {
        let source = CountingSource::new();
        let code = format!("{id:02}{PREFIX}");
        let result = block_on(CodeValidator::new(PREFIX).validate(&code, &source));

        prop_assert_eq!(result, CodeLookupResult::Maintenance(CompartmentId::new(id).unwrap()));
        prop_assert_eq!(source.fetches.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn prop_wrong_prefix_is_invalid(id in 1u8..=99, prefix in "[0-9]{6}") {
        prop_assume!(prefix != PREFIX);
        let source = CountingSource::new();
        let code = format!("{id:02}{prefix}");
        let result = block_on(CodeValidator::new(PREFIX).validate(&code, &source));

        prop_assert_eq!(result, CodeLookupResult::Invalid);
        prop_assert_eq!(source.fetches.load(Ordering::Relaxed), 0);
    }
}
