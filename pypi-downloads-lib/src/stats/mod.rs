//! Recent download counts per package.
//!
//! The counts come from the pypistats `recent` endpoint. A package the service
//! knows nothing about yields [`StatsOutcome::NotFound`], which is a terminal
//! answer for that package. Transport failures and malformed answers are
//! errors, and the caller leaves the package's record untouched.

mod download_counts;
mod provider;
mod stats_outcome;

pub use download_counts::DownloadCounts;
pub use provider::{DEFAULT_STATS_BASE_URL, Provider};
pub use stats_outcome::StatsOutcome;

use crate::Result;

/// Something that can report recent download counts for a package.
pub trait StatsSource: Send + Sync + 'static {
    /// Fetch the recent download counts for `name`.
    fn fetch_stats(&self, name: &str) -> impl Future<Output = Result<StatsOutcome>> + Send;
}
