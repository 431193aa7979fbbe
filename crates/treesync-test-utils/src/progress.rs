//! Progress token fakes.

use std::cell::Cell;

use treesync_engine::ProgressToken;

/// Counts progress traffic and can flip to cancelled after a number of
/// reported units.
#[derive(Debug, Default)]
pub struct ProgressProbe {
    begun: Cell<Option<u32>>,
    reported: Cell<u32>,
    cancel_after: Cell<Option<u32>>,
}

impl ProgressProbe {
    /// A probe that never cancels.
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe that reports cancelled once `units` units were reported.
    pub fn cancel_after(units: u32) -> Self {
        let probe = Self::default();
        probe.cancel_after.set(Some(units));
        probe
    }

    /// A probe that is cancelled from the start.
    pub fn cancelled() -> Self {
        Self::cancel_after(0)
    }

    /// The total announced via `begin`, if any.
    pub fn total(&self) -> Option<u32> {
        self.begun.get()
    }

    /// Units reported so far.
    pub fn reported(&self) -> u32 {
        self.reported.get()
    }
}

impl ProgressToken for ProgressProbe {
    fn begin(&self, total_units: u32) {
        self.begun.set(Some(total_units));
    }

    fn report(&self, units: u32) {
        self.reported.set(self.reported.get() + units);
    }

    fn is_cancelled(&self) -> bool {
        match self.cancel_after.get() {
            Some(limit) => self.reported.get() >= limit,
            None => false,
        }
    }
}
