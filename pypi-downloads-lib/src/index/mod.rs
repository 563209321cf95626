//! The universe of package names.
//!
//! The only implementation reads the PyPI simple index, an HTML page with one
//! anchor per project. Each anchor's trimmed text is the package name and its
//! `href`, resolved against the page URL, is the package URL.

mod index_entry;
mod provider;

pub use index_entry::IndexEntry;
pub use provider::{DEFAULT_INDEX_URL, Provider, parse_index};

use crate::Result;

/// Something that can list every known package.
pub trait IndexSource: Send + Sync {
    /// Fetch the full package listing.
    ///
    /// The returned entries are sorted by name and carry no duplicate names.
    /// Failing to reach or parse the listing, as well as an empty listing, is an error
    /// that callers treat as fatal.
    fn fetch_index(&self) -> impl Future<Output = Result<Vec<IndexEntry>>> + Send;
}
