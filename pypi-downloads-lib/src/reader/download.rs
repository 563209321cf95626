use super::downloads_schema;
use crate::Result;
use crate::dataset::hub::Client;
use crate::dataset::{PARQUET_FILE_NAME, Snapshot, encode_parquet, read_snapshot_parquet};
use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use ohno::{EnrichableExt, IntoAppError, app_err};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_TARGET: &str = "    reader";

/// Keep only the records with counts, reduced to the columns readers see.
pub fn valid_downloads_batch(snapshot: &Snapshot) -> Result<RecordBatch> {
    let mut names = Vec::new();
    let mut last_days = Vec::new();
    let mut last_weeks = Vec::new();
    let mut last_months = Vec::new();

    for record in snapshot {
        let Some(counts) = record.counts() else {
            continue;
        };

        names.push(record.name.as_str());
        last_days.push(to_i64(counts.last_day, &record.name)?);
        last_weeks.push(to_i64(counts.last_week, &record.name)?);
        last_months.push(to_i64(counts.last_month, &record.name)?);
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(names)),
        Arc::new(Int64Array::from(last_days)),
        Arc::new(Int64Array::from(last_weeks)),
        Arc::new(Int64Array::from(last_months)),
    ];

    RecordBatch::try_new(downloads_schema(), columns).into_app_err("unable to assemble downloads table")
}

fn to_i64(count: u64, name: &str) -> Result<i64> {
    i64::try_from(count).map_err(|_| app_err!("download count {count} of '{name}' is out of range"))
}

/// Fetch the full dataset from the Hub and write its readable part to `output`.
///
/// Returns the number of rows written.
pub async fn download_data(client: &Client, output: &Path) -> Result<usize> {
    let repo = client.repo();
    log::info!(target: LOG_TARGET, "Downloading '{PARQUET_FILE_NAME}' from '{repo}'");

    let data = client
        .download_file(PARQUET_FILE_NAME)
        .await?
        .ok_or_else(|| app_err!("dataset repository '{repo}' has no '{PARQUET_FILE_NAME}'"))?;

    let snapshot = read_snapshot_parquet(data).map_err(|e| e.enrich_with(|| format!("decoding '{PARQUET_FILE_NAME}' from '{repo}'")))?;
    let batch = valid_downloads_batch(&snapshot)?;
    let rows = batch.num_rows();
    let encoded = encode_parquet(&batch)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let temp_path = temp_sibling(output);
    tokio::fs::write(&temp_path, &encoded)
        .await
        .into_app_err_with(|| format!("unable to write '{}'", temp_path.display()))?;

    if let Err(e) = tokio::fs::rename(&temp_path, output).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e).into_app_err_with(|| format!("unable to move downloads table into place at '{}'", output.display()));
    }

    log::info!(
        target: LOG_TARGET,
        "Wrote {rows} of {} packages to '{}'",
        snapshot.len(),
        output.display()
    );

    Ok(rows)
}

/// `output` with `.tmp` appended, so a partial write never shadows a good file.
fn temp_sibling(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
