//! Runtime invariants with contract coverage
//!
//! Engine code states its invariants with [`assert_invariant!`]. Every check
//! is recorded per thread, so a contract test can run a scenario and then
//! demand that the invariants it cares about were actually evaluated.
//!
//! ```rust,ignore
//! assert_invariant!(
//!     packet.wire_len() <= max_packet_size,
//!     "Packet must fit within the max packet size"
//! );
//!
//! #[test]
//! fn contract_packetizer() {
//!     // ... run the packetizer ...
//!     contract_test("packetizer", &["Packet must fit within the max packet size"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::thread_local;

thread_local! {
    static CHECKED: RefCell<HashMap<&'static str, u64>> = RefCell::new(HashMap::new());
}

/// Check an invariant and record that it was evaluated.
///
/// Panics with the message (and optional context) when the condition is
/// false. Invariants guard engine logic, never peer input.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__check_invariant($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant(condition: bool, message: &'static str, context: Option<&str>) {
    CHECKED.with(|checked| {
        *checked.borrow_mut().entry(message).or_insert(0) += 1;
    });

    if !condition {
        log::error!("Invariant violated: {}", message);
        panic!(
            "INVARIANT VIOLATION [{}]: {}",
            context.unwrap_or("unknown"),
            message
        );
    }
}

/// How many times `message` was checked on this thread.
pub fn times_checked(message: &str) -> u64 {
    CHECKED.with(|checked| checked.borrow().get(message).copied().unwrap_or(0))
}

/// Panic unless every invariant in `required` was checked on this thread.
pub fn contract_test(test_name: &str, required: &[&str]) {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|message| times_checked(message) == 0)
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: invariants never checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Forget everything recorded on this thread.
pub fn clear_invariant_log() {
    CHECKED.with(|checked| checked.borrow_mut().clear());
}
