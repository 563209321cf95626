use strum::{Display, EnumString};

/// Lifecycle state of a package record as stored in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RecordStatus {
    /// Listed in the index but never fetched.
    Pending,

    /// Fetched, and the stats service reported counts.
    Valid,

    /// Fetched, and the stats service had no data. Older artifacts spell this `empty`.
    #[strum(to_string = "invalid", serialize = "empty")]
    Invalid,
}
