//! # Canonical Status Messages
//!
//! Process-wide lookup of the human-readable message a serving endpoint must
//! report for each valid `(state, error_code)` pair. Built once on first use
//! and never mutated.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::proto::{model_version_status::State, Code};

static STATUS_MESSAGES: LazyLock<HashMap<(State, Code), &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ((State::Start, Code::Ok), "Version detected"),
        ((State::Loading, Code::Ok), "Version is being loaded"),
        (
            (State::Loading, Code::Unknown),
            "Error occurred while loading version",
        ),
        ((State::Available, Code::Ok), "Version available"),
        (
            (State::Unloading, Code::Ok),
            "Version is scheduled to be deleted",
        ),
        ((State::End, Code::Ok), "Version has been removed"),
    ])
});

/// Canonical message for a typed `(state, error_code)` pair.
pub fn canonical_message(state: State, error_code: Code) -> Option<&'static str> {
    STATUS_MESSAGES.get(&(state, error_code)).copied()
}

/// Canonical message for raw wire values.
///
/// Values outside the proto enums resolve to `None` instead of falling back
/// to a default variant.
pub fn canonical_message_raw(state: i32, error_code: i32) -> Option<&'static str> {
    let state = State::try_from(state).ok()?;
    let code = Code::try_from(error_code).ok()?;
    canonical_message(state, code)
}

/// Every registered pair, sorted by state then code.
pub fn registered_pairs() -> Vec<(State, Code)> {
    let mut pairs: Vec<_> = STATUS_MESSAGES.keys().copied().collect();
    pairs.sort();
    pairs
}
