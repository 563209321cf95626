//! Cached, read-only access to the published downloads table.
//!
//! The readable artifact holds only packages with counts, reduced to four columns:
//! `name`, `last_day`, `last_week`, and `last_month`. [`load_data`] reads it once
//! per process and shares the result; [`load_data_owned`] hands out a private copy.

mod download;
mod downloads_table;
mod loader;

pub use download::{download_data, valid_downloads_batch};
pub use downloads_table::{DownloadRow, DownloadRowRef, DownloadsTable, downloads_schema};
pub use loader::{
    DATA_FILE_ENV, DEFAULT_REPO, DataLoader, HUB_ENDPOINT_ENV, HUB_TOKEN_ENV, REPO_ENV, ReaderConfig, default_data_file, load_data,
    load_data_owned, read_downloads_file,
};
