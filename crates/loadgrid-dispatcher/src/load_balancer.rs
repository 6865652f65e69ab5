//! Round-robin cursor.
//!
//! Hands out host indices in strict cyclic order using one atomic
//! read-modify-write per selection. Lock-free and safe for concurrent
//! access.

use std::sync::atomic::{AtomicUsize, Ordering};

/// A round-robin cursor over a fixed number of hosts.
///
/// The stored value is always the *next* index to hand out and stays in
/// `0..count`, so every concurrent caller receives a distinct ticket and
/// the cycle never skews on counter wrap-around.
pub struct RoundRobinBalancer {
    cursor: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }

    /// Select the next index and advance the cursor modulo `count`.
    ///
    /// Returns `None` if count is zero.
    pub fn next(&self, count: usize) -> Option<usize> {
        if count == 0 {
            return None;
        }
        let previous = self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| {
                Some((i % count + 1) % count)
            })
            .unwrap_or_else(|i| i);
        Some(previous % count)
    }
}

impl Default for RoundRobinBalancer {
    fn default() -> Self {
        Self::new()
    }
}
