/// What one refresh run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Packages listed by the index.
    pub indexed: usize,

    /// Indexed packages that were new to the dataset.
    pub inserted: usize,

    /// Records selected for fetching.
    pub stale: usize,

    /// Fetches that produced counts.
    pub valid: usize,

    /// Fetches for which the stats service had no data.
    pub invalid: usize,

    /// Fetches that failed and left their record unchanged.
    pub failed: usize,

    /// Intermediate saves that succeeded.
    pub checkpoints: usize,

    /// Whether the run ended with a save.
    pub final_save: bool,

    /// Whether the run was cut short by an interrupt.
    pub interrupted: bool,
}

impl RefreshSummary {
    /// Number of stale records whose fetch completed, successfully or not.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.valid + self.invalid + self.failed
    }
}

impl core::fmt::Display for RefreshSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} indexed, {} new, {} stale, {} valid, {} invalid, {} failed, {} checkpoints",
            self.indexed, self.inserted, self.stale, self.valid, self.invalid, self.failed, self.checkpoints
        )?;

        if self.interrupted {
            write!(f, " (interrupted)")?;
        }

        Ok(())
    }
}
