//! The process-wide loader, configured through the environment.
//!
//! Kept in its own test binary because it sets process environment variables.

use chrono::DateTime;
use pypi_downloads_lib::dataset::{PackageRecord, Snapshot, encode_parquet};
use pypi_downloads_lib::reader::{DATA_FILE_ENV, REPO_ENV, valid_downloads_batch};
use pypi_downloads_lib::stats::{DownloadCounts, StatsOutcome};
use pypi_downloads_lib::{load_data, load_data_owned};
use std::sync::Arc;

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_load_data_is_shared_across_calls() {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let mut requests = PackageRecord::pending("requests", None);
    requests.apply(StatsOutcome::Valid(DownloadCounts::new(10, 70, 300)), now);
    let snapshot = Snapshot::from_records([requests, PackageRecord::pending("new", None)]);

    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("downloads.parquet");
    let encoded = encode_parquet(&valid_downloads_batch(&snapshot).unwrap()).unwrap();
    std::fs::write(&data_file, encoded).unwrap();

    // SAFETY: this is the only test in the binary, so no other thread reads the environment.
    unsafe {
        std::env::set_var(DATA_FILE_ENV, &data_file);
        std::env::set_var(REPO_ENV, "owner/data");
    }

    let first = load_data().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first.get("requests").unwrap().last_month, 300);

    // Later calls never go back to the disk.
    std::fs::remove_file(&data_file).unwrap();
    let second = load_data().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let mut owned = load_data_owned().await.unwrap();
    owned[0].last_month = 0;
    assert_eq!(load_data().await.unwrap().get("requests").unwrap().last_month, 300);
}
