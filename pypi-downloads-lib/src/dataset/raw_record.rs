use super::package_record::from_unix_seconds;
use super::{PackageRecord, RecordState, RecordStatus};
use crate::stats::DownloadCounts;
use core::str::FromStr;

const LOG_TARGET: &str = "   dataset";

/// A dataset row as it was found in an artifact, before any validation.
///
/// Every column but `name` may be missing, either because the artifact predates
/// the column or because the cell is null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub name: String,
    pub url: Option<String>,
    pub last_day: Option<i64>,
    pub last_week: Option<i64>,
    pub last_month: Option<i64>,
    pub status: Option<String>,
    pub updated_at: Option<f64>,
}

impl RawRecord {
    /// Turn the row into a well-formed record.
    ///
    /// Rows that cannot be trusted fall back to `pending` so the next refresh
    /// fetches them again:
    ///
    /// - without a status, the row is `valid` when it has `last_month` and a fetch
    ///   time (a missing `last_day` or `last_week` reads as 0), `invalid` when it has
    ///   a fetch time but no `last_month`, and `pending` otherwise
    /// - `invalid` (or the older `empty`) needs a fetch time
    /// - `valid` needs all three counts and a fetch time
    ///
    /// Negative counts always make the row `pending`.
    #[must_use]
    pub fn into_record(self) -> PackageRecord {
        let updated_at = self.updated_at.and_then(from_unix_seconds);
        let counts = match (self.last_day, self.last_week, self.last_month) {
            (Some(day), Some(week), Some(month)) => DownloadCounts::from_signed(day, week, month),
            _ => None,
        };
        let legacy_counts = self
            .last_month
            .map(|month| DownloadCounts::from_signed(self.last_day.unwrap_or(0), self.last_week.unwrap_or(0), month));

        let status = self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()).and_then(|s| {
            RecordStatus::from_str(s)
                .inspect_err(|_| log::debug!(target: LOG_TARGET, "Unknown status '{s}' for '{}'", self.name))
                .ok()
                .or(Some(RecordStatus::Pending))
        });

        let state = match (status, updated_at) {
            (_, None) | (Some(RecordStatus::Pending), _) => RecordState::Pending,
            (Some(RecordStatus::Valid), Some(updated_at)) => counts.map_or(RecordState::Pending, |counts| RecordState::Valid { counts, updated_at }),
            (Some(RecordStatus::Invalid), Some(updated_at)) => RecordState::Invalid { updated_at },
            (None, Some(updated_at)) => match legacy_counts {
                Some(Some(counts)) => RecordState::Valid { counts, updated_at },
                Some(None) => RecordState::Pending,
                None => RecordState::Invalid { updated_at },
            },
        };

        PackageRecord {
            name: self.name,
            url: self.url.filter(|u| !u.is_empty()),
            state,
        }
    }
}
