//! PPT invariant system: runtime invariant enforcement with contract tracking.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

// Invariant constants for contract tracking.
pub const GRAPH_LEGALITY: u32 = 1;
pub const GRAPH_REJECTS_INVALID: u32 = 2;
pub const ORDER_SOUNDNESS: u32 = 3;
pub const STATE_INIT_COMPLETE: u32 = 4;
pub const RANGE_INVARIANT: u32 = 5;
pub const PHASE_IN_RANGE: u32 = 6;
pub const RING_INTACT: u32 = 7;
pub const TICK_DETERMINISM: u32 = 8;
pub const TICK_NO_ALLOC: u32 = 9;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        eprintln!("{}", full_message);
        panic!("{}", full_message);
    }
    // Log the invariant presence
    INVARIANT_LOG.lock().unwrap().insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks the condition and panics on failure.
pub fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that the specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let log = INVARIANT_LOG.lock().unwrap();
    let mut missing = Vec::new();
    for &inv in required_invariants {
        if !log.contains(&inv) {
            missing.push(inv);
        }
    }
    drop(log); // Drop the lock before panicking
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name, missing
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when the PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "ppt")]
/// Record an invariant as observed without asserting a condition.
///
/// Integration tests use this to log properties they verified externally
/// (determinism runs, allocation counts) so contracts can require them.
pub fn record_invariant(id: u32) {
    INVARIANT_LOG.lock().unwrap().insert(id);
}

#[cfg(not(feature = "ppt"))]
/// Record an invariant: no-op when the PPT feature is disabled.
pub fn record_invariant(_id: u32) {}

#[cfg(feature = "ppt")]
/// Clear the invariant log (between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG.lock().unwrap().clear();
}

#[cfg(not(feature = "ppt"))]
/// Clear the invariant log: no-op when the PPT feature is disabled.
pub fn clear_invariant_log() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assert_invariant_passes_and_logs() {
        assert_invariant(0, 1 + 1 == 2, "arithmetic holds", Some("basic"));
        // Should not panic
    }

    #[test]
    #[should_panic]
    fn assert_invariant_fails() {
        assert_invariant(0, 1 + 1 == 3, "arithmetic broken", None);
    }

    #[test]
    fn contract_requires_logged_invariants() {
        clear_invariant_log();
        #[cfg(feature = "ppt")]
        {
            record_invariant(RANGE_INVARIANT);
            contract_test("example", &[RANGE_INVARIANT]);
        }

        #[cfg(not(feature = "ppt"))]
        {
            // When PPT is disabled, contract tests are a no-op.
            contract_test("example", &[RANGE_INVARIANT]);
        }
    }
}
