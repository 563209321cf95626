use super::RecordStatus;
use crate::stats::{DownloadCounts, StatsOutcome};
use chrono::{DateTime, Utc};

/// Where a record stands in its lifecycle.
///
/// Counts exist only for fetched packages the stats service knows about, and
/// every fetched record carries the time it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Valid { counts: DownloadCounts, updated_at: DateTime<Utc> },
    Invalid { updated_at: DateTime<Utc> },
}

/// One row of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub url: Option<String>,
    pub state: RecordState,
}

impl PackageRecord {
    /// A freshly indexed, never fetched package.
    #[must_use]
    pub fn pending(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            state: RecordState::Pending,
        }
    }

    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        match self.state {
            RecordState::Pending => RecordStatus::Pending,
            RecordState::Valid { .. } => RecordStatus::Valid,
            RecordState::Invalid { .. } => RecordStatus::Invalid,
        }
    }

    #[must_use]
    pub const fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            RecordState::Pending => None,
            RecordState::Valid { updated_at, .. } | RecordState::Invalid { updated_at } => Some(updated_at),
        }
    }

    #[must_use]
    pub const fn counts(&self) -> Option<DownloadCounts> {
        match self.state {
            RecordState::Valid { counts, .. } => Some(counts),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self.state, RecordState::Valid { .. })
    }

    /// Record the answer of the stats service, fetched at `now`.
    ///
    /// The stored time is truncated to whole milliseconds so that it survives the
    /// trip through the dataset's float seconds column unchanged.
    pub fn apply(&mut self, outcome: StatsOutcome, now: DateTime<Utc>) {
        let updated_at = truncate_to_millis(now);
        self.state = match outcome {
            StatsOutcome::Valid(counts) => RecordState::Valid { counts, updated_at },
            StatsOutcome::NotFound => RecordState::Invalid { updated_at },
        };
    }
}

/// Convert a timestamp to the float Unix seconds stored in the dataset.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "millisecond timestamps fit in an f64 mantissa")]
pub fn to_unix_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

/// Convert float Unix seconds read from the dataset back to a timestamp.
///
/// Returns `None` for values that are not finite or are out of range.
#[must_use]
#[expect(clippy::cast_possible_truncation, reason = "range is checked before the cast")]
pub fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    const MAX_MILLIS: f64 = 8.2e15;

    if !secs.is_finite() {
        return None;
    }

    let millis = (secs * 1000.0).round();
    if millis.abs() > MAX_MILLIS {
        return None;
    }

    DateTime::from_timestamp_millis(millis as i64)
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
