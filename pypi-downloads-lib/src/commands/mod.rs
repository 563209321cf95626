//! Command-line interface and orchestration for pypi-downloads
//!
//! This module parses the command line and wires the other modules together
//! into the three user-facing workflows.
//!
//! ## Commands
//!
//! - **sync**: Fetch the package index, load the current dataset, refresh every
//!   stale record from the stats service, and publish the result. Outside test mode
//!   the dataset lives in a Hub repository and requests go through a proxy pool; in
//!   test mode (or with `--local-dir`) it lives in a local directory.
//! - **download-data**: Fetch the published dataset and write the reduced table
//!   that [`crate::reader`] reads.
//! - **init**: Generate a default configuration file.
//!
//! The `common` module provides logging setup, color mode handling, and the
//! progress reporter used while a refresh runs.

mod common;
mod config;
mod download;
mod host;
mod init;
mod progress_reporter;
mod run;
mod sync;

#[cfg(debug_assertions)]
pub use config::Config;

pub use download::{DownloadArgs, download_command};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use sync::{SyncArgs, sync_command};
