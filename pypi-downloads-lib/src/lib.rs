#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for pypi-downloads
//!
//! This library consolidates all functionality for the pypi-downloads tool, which keeps a
//! dataset of recent PyPI download counts fresh and republishes it to a hosted dataset
//! repository.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`http`]: Shared HTTP client, retry policy, and concurrency throttling
//! - [`index`]: The universe of package names from the PyPI simple index
//! - [`stats`]: Per-package recent download counts from pypistats
//! - [`dataset`]: Package records, snapshots, and the stores that persist them
//! - [`refresh`]: The staleness-driven refresh pipeline
//! - [`reader`]: Cached, read-only access to the published downloads table

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(any(debug_assertions, test))]
pub mod commands;
#[cfg(not(any(debug_assertions, test)))]
mod commands;

pub mod dataset;
pub mod http;
pub mod index;
pub mod reader;
pub mod refresh;
pub mod stats;

pub use crate::commands::{Host, run};
pub use crate::reader::{DownloadRow, DownloadsTable, load_data, load_data_owned};
