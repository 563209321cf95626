use crate::dataset::{PackageRecord, RecordState, Snapshot};
use crate::index::IndexEntry;
use chrono::{DateTime, Utc};
use core::time::Duration;

/// Default age after which a fetched record is fetched again.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Returns whether `record` should be fetched again at `now`.
///
/// Never-fetched records are always stale. Fetched records are stale once they
/// are strictly older than `threshold`; a fetch time in the future counts as fresh.
#[must_use]
pub fn is_stale(record: &PackageRecord, now: DateTime<Utc>, threshold: Duration) -> bool {
    let updated_at = match record.state {
        RecordState::Pending => return true,
        RecordState::Valid { updated_at, .. } | RecordState::Invalid { updated_at } => updated_at,
    };

    now.signed_duration_since(updated_at)
        .to_std()
        .is_ok_and(|age| age > threshold)
}

/// Add a pending record for every indexed name the snapshot lacks.
///
/// Existing records that have no URL adopt the index's. Records absent from the
/// index are left alone. Returns `(inserted, updated)` counts.
pub fn merge_index(snapshot: &mut Snapshot, entries: impl IntoIterator<Item = IndexEntry>) -> (usize, usize) {
    let mut inserted = 0;
    let mut updated = 0;

    for IndexEntry { name, url } in entries {
        if let Some(record) = snapshot.get_mut(&name) {
            if record.url.is_none() {
                record.url = Some(url);
                updated += 1;
            }
        } else if snapshot.insert_if_absent(PackageRecord::pending(name, Some(url))) {
            inserted += 1;
        }
    }

    (inserted, updated)
}

/// Names of every stale record, in name order, capped at `limit` when given.
#[must_use]
pub fn select_stale(snapshot: &Snapshot, now: DateTime<Utc>, threshold: Duration, limit: Option<usize>) -> Vec<String> {
    snapshot
        .iter()
        .filter(|record| is_stale(record, now, threshold))
        .take(limit.unwrap_or(usize::MAX))
        .map(|record| record.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{DownloadCounts, StatsOutcome};

    const DAY: i64 = 24 * 60 * 60;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn fetched(name: &str, outcome: StatsOutcome, age_secs: i64) -> PackageRecord {
        let mut record = PackageRecord::pending(name, None);
        record.apply(outcome, now() - chrono::Duration::seconds(age_secs));
        record
    }

    fn valid(name: &str, age_secs: i64) -> PackageRecord {
        fetched(name, StatsOutcome::Valid(DownloadCounts::new(1, 2, 3)), age_secs)
    }

    #[test]
    fn test_pending_is_stale() {
        assert!(is_stale(&PackageRecord::pending("a", None), now(), DEFAULT_STALE_THRESHOLD));
    }

    #[test]
    fn test_recent_valid_is_fresh() {
        assert!(!is_stale(&valid("a", DAY), now(), DEFAULT_STALE_THRESHOLD));
    }

    #[test]
    fn test_old_records_are_stale() {
        assert!(is_stale(&valid("a", 31 * DAY), now(), DEFAULT_STALE_THRESHOLD));
        assert!(is_stale(&fetched("b", StatsOutcome::NotFound, 31 * DAY), now(), DEFAULT_STALE_THRESHOLD));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_stale(&valid("a", 30 * DAY), now(), DEFAULT_STALE_THRESHOLD));
        assert!(is_stale(&valid("a", 30 * DAY + 1), now(), DEFAULT_STALE_THRESHOLD));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        assert!(!is_stale(&valid("a", -DAY), now(), DEFAULT_STALE_THRESHOLD));
    }

    #[test]
    fn test_merge_index_inserts_missing_and_fills_urls() {
        let mut snapshot = Snapshot::from_records([
            valid("a", DAY),
            PackageRecord::pending("b", Some("https://old.example/b/".to_string())),
            PackageRecord::pending("gone", None),
        ]);

        let (inserted, updated) = merge_index(
            &mut snapshot,
            [
                IndexEntry::new("a", "https://pypi.org/simple/a/"),
                IndexEntry::new("b", "https://pypi.org/simple/b/"),
                IndexEntry::new("c", "https://pypi.org/simple/c/"),
            ],
        );

        assert_eq!((inserted, updated), (1, 1));
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.get("a").unwrap().url.as_deref(), Some("https://pypi.org/simple/a/"));
        assert_eq!(snapshot.get("b").unwrap().url.as_deref(), Some("https://old.example/b/"));
        assert_eq!(snapshot.get("c").unwrap().state, RecordState::Pending);
        assert!(snapshot.contains("gone"));
        assert!(snapshot.get("a").unwrap().is_valid());
    }

    #[test]
    fn test_select_stale_in_name_order_with_limit() {
        let snapshot = Snapshot::from_records([
            PackageRecord::pending("d", None),
            valid("c", DAY),
            valid("b", 40 * DAY),
            PackageRecord::pending("a", None),
        ]);

        assert_eq!(select_stale(&snapshot, now(), DEFAULT_STALE_THRESHOLD, None), vec!["a", "b", "d"]);
        assert_eq!(select_stale(&snapshot, now(), DEFAULT_STALE_THRESHOLD, Some(2)), vec!["a", "b"]);
        assert!(select_stale(&snapshot, now(), DEFAULT_STALE_THRESHOLD, Some(0)).is_empty());
    }
}
