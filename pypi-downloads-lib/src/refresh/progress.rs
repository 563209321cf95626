use core::fmt::{Display, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The waiting stages of a refresh run. Fetching has its own [`FetchTally`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Indexing,
    Loading,
    Saving,
}

impl RefreshPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Indexing => "Indexing",
            Self::Loading => "Loading",
            Self::Saving => "Saving",
        }
    }
}

/// Live counters of the fetch stage, updated by the refresher as results arrive.
#[derive(Debug, Default)]
pub struct FetchTally {
    total: u64,
    valid: AtomicU64,
    invalid: AtomicU64,
    failed: AtomicU64,
    checkpoints: AtomicU64,
}

impl FetchTally {
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self { total, ..Self::default() }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.valid() + self.invalid() + self.failed()
    }

    #[must_use]
    pub fn valid(&self) -> u64 {
        self.valid.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn invalid(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn checkpoints(&self) -> u64 {
        self.checkpoints.load(Ordering::Relaxed)
    }

    pub(crate) fn add_valid(&self) {
        let _ = self.valid.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_invalid(&self) {
        let _ = self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_failed(&self) {
        let _ = self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_checkpoint(&self) {
        let _ = self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }
}

impl Display for FetchTally {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}/{} packages, {} valid, {} without data, {} failed",
            self.processed(),
            self.total,
            self.valid(),
            self.invalid(),
            self.failed()
        )?;

        match self.checkpoints() {
            0 => Ok(()),
            1 => write!(f, ", 1 checkpoint"),
            n => write!(f, ", {n} checkpoints"),
        }
    }
}

/// Receives progress updates from a refresh as it moves through its phases.
pub trait Progress: Send + Sync {
    /// A waiting phase started. `detail` names what it waits on.
    fn phase(&self, phase: RefreshPhase, detail: &str);

    /// Stale records are being fetched; `tally` keeps changing until the stage ends.
    fn fetching(&self, tally: Arc<FetchTally>);

    /// Finish and clear the progress indicator.
    fn done(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_display() {
        let tally = FetchTally::new(10);
        tally.add_valid();
        tally.add_valid();
        tally.add_invalid();
        tally.add_failed();
        assert_eq!(tally.processed(), 4);
        assert_eq!(tally.to_string(), "4/10 packages, 2 valid, 1 without data, 1 failed");

        tally.add_checkpoint();
        assert!(tally.to_string().ends_with(", 1 checkpoint"));
        tally.add_checkpoint();
        assert!(tally.to_string().ends_with(", 2 checkpoints"));
    }
}
