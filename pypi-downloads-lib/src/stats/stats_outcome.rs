use super::DownloadCounts;

/// What the stats service said about one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsOutcome {
    /// The service has counts for the package.
    Valid(DownloadCounts),

    /// The service has no data for the package.
    NotFound,
}

impl StatsOutcome {
    /// The counts, when the service had any.
    #[must_use]
    pub const fn counts(&self) -> Option<DownloadCounts> {
        match self {
            Self::Valid(counts) => Some(*counts),
            Self::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let counts = DownloadCounts::new(1, 2, 3);
        assert_eq!(StatsOutcome::Valid(counts).counts(), Some(counts));
        assert_eq!(StatsOutcome::NotFound.counts(), None);
    }
}
