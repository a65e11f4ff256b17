//! Stale-snapshot guard for filter fetches.
//!
//! A superseded fetch (the user changed the filter before the previous
//! request resolved) may still resolve later. Each issued fetch gets a
//! monotonically increasing sequence number; only the most recently
//! issued request's response is admitted, so a slow stale response
//! never clobbers a fresher one.

/// Sequence-numbered admission gate for snapshot responses.
#[derive(Debug, Default)]
pub struct FetchGate {
    issued: u64,
}

impl FetchGate {
    #[must_use]
    pub const fn new() -> Self {
        Self { issued: 0 }
    }

    /// Registers a new fetch and returns its sequence number.
    pub fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// True if a response with this sequence number should be applied.
    #[must_use]
    pub const fn admits(&self, seq: u64) -> bool {
        seq == self.issued
    }
}
