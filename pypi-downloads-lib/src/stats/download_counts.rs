/// Download totals over the trailing day, week, and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DownloadCounts {
    pub last_day: u64,
    pub last_week: u64,
    pub last_month: u64,
}

impl DownloadCounts {
    #[must_use]
    pub const fn new(last_day: u64, last_week: u64, last_month: u64) -> Self {
        Self {
            last_day,
            last_week,
            last_month,
        }
    }

    /// Build counts from signed values, rejecting any negative one.
    #[must_use]
    pub fn from_signed(last_day: i64, last_week: i64, last_month: i64) -> Option<Self> {
        Some(Self {
            last_day: u64::try_from(last_day).ok()?,
            last_week: u64::try_from(last_week).ok()?,
            last_month: u64::try_from(last_month).ok()?,
        })
    }
}

impl core::fmt::Display for DownloadCounts {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{} (day/week/month)", self.last_day, self.last_week, self.last_month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_signed_accepts_non_negative() {
        assert_eq!(DownloadCounts::from_signed(0, 7, 30), Some(DownloadCounts::new(0, 7, 30)));
    }

    #[test]
    fn test_from_signed_rejects_negative() {
        assert_eq!(DownloadCounts::from_signed(1, -1, 30), None);
        assert_eq!(DownloadCounts::from_signed(-5, 7, 30), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(DownloadCounts::new(10, 70, 300).to_string(), "10/70/300 (day/week/month)");
    }
}
