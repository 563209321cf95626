use super::{PackageRecord, RecordState};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// The whole dataset, keyed and ordered by package name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<String, PackageRecord>,
}

impl Snapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from records in artifact order. When a name repeats, the
    /// first record wins.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let mut snapshot = Self::new();
        for record in records {
            let _ = snapshot.insert_if_absent(record);
        }
        snapshot
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PackageRecord> {
        self.records.get_mut(name)
    }

    /// Add `record` unless a record with the same name exists. Returns whether it was added.
    pub fn insert_if_absent(&mut self, record: PackageRecord) -> bool {
        match self.records.entry(record.name.clone()) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(record);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Records in name order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    /// Package names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    #[must_use]
    pub fn summary(&self) -> SnapshotSummary {
        let mut summary = SnapshotSummary {
            total: self.records.len(),
            ..SnapshotSummary::default()
        };

        for record in self.records.values() {
            match record.state {
                RecordState::Pending => {}
                RecordState::Valid { .. } => {
                    summary.fetched += 1;
                    summary.valid += 1;
                }
                RecordState::Invalid { .. } => summary.fetched += 1,
            }
        }

        summary
    }
}

impl IntoIterator for Snapshot {
    type Item = PackageRecord;
    type IntoIter = std::collections::btree_map::IntoValues<String, PackageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a PackageRecord;
    type IntoIter = std::collections::btree_map::Values<'a, String, PackageRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}

/// Headline numbers describing a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    /// Every record.
    pub total: usize,

    /// Records that were fetched at least once (`valid` or `invalid`).
    pub fetched: usize,

    /// Records with counts.
    pub valid: usize,
}

impl SnapshotSummary {
    /// The message attached to each published revision of the dataset.
    #[must_use]
    pub fn commit_message(&self) -> String {
        format!(
            "Update PyPI - {} packages, {} ({:.1}%) with data, {} ({:.1}%) non empty",
            group_thousands(self.total),
            group_thousands(self.fetched),
            percent(self.fetched, self.total),
            group_thousands(self.valid),
            percent(self.valid, self.total),
        )
    }
}

#[expect(clippy::cast_precision_loss, reason = "display only")]
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
