use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free round-robin selector
///
/// Every call performs one atomic fetch-and-add on a shared `u32` counter and uses the
/// post-increment value, so the first selection of a fresh selector is index
/// `1 % len`. The counter wraps on overflow.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU32,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary counter value
    pub fn starting_at(initial: u32) -> Self {
        Self {
            counter: AtomicU32::new(initial),
        }
    }

    /// Increment the counter and return the new value
    pub fn next_ticket(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Pick an index in `0..len`, `None` for an empty list
    pub fn select(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }

        Some(self.next_ticket() as usize % len)
    }

    /// Current counter value
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }
}
