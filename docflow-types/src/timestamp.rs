//! Process-monotonic wall clock.
//!
//! Change events carry a millisecond timestamp. Two calls in the same
//! millisecond must still be distinguishable, so [`now`] never returns the
//! same value twice within one process. The value may run slightly ahead of
//! the real clock under heavy load; it is an ordering hint, not an
//! authoritative time across processes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static LAST_NOW: AtomicU64 = AtomicU64::new(0);

/// Returns the current unix time in milliseconds, strictly greater than any
/// value previously returned in this process.
#[must_use]
pub fn now() -> u64 {
    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut last = LAST_NOW.load(Ordering::Relaxed);
    loop {
        let next = if wall > last { wall } else { last + 1 };
        match LAST_NOW.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}
