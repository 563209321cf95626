//! Columnar encoding of snapshots.
//!
//! The published artifact is a single Parquet file with one row per package,
//! sorted by name. Readers are liberal: count columns may be integers or floats,
//! and the `url` and `status` columns may be absent altogether.

use super::package_record::to_unix_seconds;
use super::{RawRecord, Snapshot};
use crate::Result;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use bytes::Bytes;
use ohno::{IntoAppError, app_err};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Primary artifact name inside a dataset repository or directory.
pub const PARQUET_FILE_NAME: &str = "dataset.parquet";

/// Arrow schema of the full dataset.
#[must_use]
pub fn snapshot_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("url", DataType::Utf8, true),
        Field::new("last_day", DataType::Int64, true),
        Field::new("last_week", DataType::Int64, true),
        Field::new("last_month", DataType::Int64, true),
        Field::new("status", DataType::Utf8, true),
        Field::new("updated_at", DataType::Float64, true),
    ]))
}

/// Convert a snapshot into a single record batch in name order.
pub fn snapshot_to_record_batch(snapshot: &Snapshot) -> Result<RecordBatch> {
    let len = snapshot.len();

    let mut names = Vec::with_capacity(len);
    let mut urls: Vec<Option<&str>> = Vec::with_capacity(len);
    let mut last_days: Vec<Option<i64>> = Vec::with_capacity(len);
    let mut last_weeks: Vec<Option<i64>> = Vec::with_capacity(len);
    let mut last_months: Vec<Option<i64>> = Vec::with_capacity(len);
    let mut statuses = Vec::with_capacity(len);
    let mut updated_ats: Vec<Option<f64>> = Vec::with_capacity(len);

    for record in snapshot {
        names.push(record.name.as_str());
        urls.push(record.url.as_deref());

        let counts = record.counts();
        last_days.push(counts.map(|c| count_to_i64(c.last_day)).transpose()?);
        last_weeks.push(counts.map(|c| count_to_i64(c.last_week)).transpose()?);
        last_months.push(counts.map(|c| count_to_i64(c.last_month)).transpose()?);

        statuses.push(Some(record.status().to_string()));
        updated_ats.push(record.updated_at().map(to_unix_seconds));
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(names)),
        Arc::new(StringArray::from(urls)),
        Arc::new(Int64Array::from(last_days)),
        Arc::new(Int64Array::from(last_weeks)),
        Arc::new(Int64Array::from(last_months)),
        Arc::new(StringArray::from(statuses)),
        Arc::new(Float64Array::from(updated_ats)),
    ];

    RecordBatch::try_new(snapshot_schema(), columns).into_app_err("unable to assemble dataset record batch")
}

fn count_to_i64(count: u64) -> Result<i64> {
    i64::try_from(count).into_app_err_with(|| format!("download count {count} does not fit the dataset"))
}

/// Encode a record batch as a zstd-compressed Parquet file.
pub fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props)).into_app_err("unable to start Parquet writer")?;
    writer.write(batch).into_app_err("unable to write Parquet rows")?;
    let _ = writer.close().into_app_err("unable to finish Parquet file")?;

    Ok(buf)
}

/// Encode a whole snapshot as the dataset's Parquet artifact.
pub fn write_snapshot_parquet(snapshot: &Snapshot) -> Result<Vec<u8>> {
    encode_parquet(&snapshot_to_record_batch(snapshot)?)
}

/// Read every record batch of a Parquet file.
pub fn decode_parquet(data: Bytes) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data).into_app_err("not a readable Parquet file")?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build().into_app_err("unable to read Parquet file")?;

    let batches = reader
        .collect::<core::result::Result<Vec<_>, _>>()
        .into_app_err("unable to decode Parquet rows")?;

    Ok((schema, batches))
}

/// Decode the dataset's Parquet artifact into a snapshot.
pub fn read_snapshot_parquet(data: Bytes) -> Result<Snapshot> {
    let (_, batches) = decode_parquet(data)?;

    let mut rows = Vec::new();
    for batch in &batches {
        rows.extend(raw_records_from_batch(batch)?);
    }

    Ok(Snapshot::from_records(rows.into_iter().map(RawRecord::into_record)))
}

/// Extract rows from a batch of any dataset generation.
pub fn raw_records_from_batch(batch: &RecordBatch) -> Result<Vec<RawRecord>> {
    let names = string_column(batch, "name")?.ok_or_else(|| app_err!("dataset has no 'name' column"))?;
    let urls = string_column(batch, "url")?;
    let last_days = int_column(batch, "last_day")?;
    let last_weeks = int_column(batch, "last_week")?;
    let last_months = int_column(batch, "last_month")?;
    let statuses = string_column(batch, "status")?;
    let updated_ats = float_column(batch, "updated_at")?;

    let names = names.as_string::<i32>();
    let urls = urls.as_ref().map(|a| a.as_string::<i32>());
    let last_days = last_days.as_ref().map(|a| a.as_primitive::<Int64Type>());
    let last_weeks = last_weeks.as_ref().map(|a| a.as_primitive::<Int64Type>());
    let last_months = last_months.as_ref().map(|a| a.as_primitive::<Int64Type>());
    let statuses = statuses.as_ref().map(|a| a.as_string::<i32>());
    let updated_ats = updated_ats.as_ref().map(|a| a.as_primitive::<Float64Type>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if names.is_null(i) {
            continue;
        }

        rows.push(RawRecord {
            name: names.value(i).to_string(),
            url: urls.and_then(|a| a.is_valid(i).then(|| a.value(i).to_string())),
            last_day: last_days.and_then(|a| a.is_valid(i).then(|| a.value(i))),
            last_week: last_weeks.and_then(|a| a.is_valid(i).then(|| a.value(i))),
            last_month: last_months.and_then(|a| a.is_valid(i).then(|| a.value(i))),
            status: statuses.and_then(|a| a.is_valid(i).then(|| a.value(i).to_string())),
            updated_at: updated_ats.and_then(|a| a.is_valid(i).then(|| a.value(i))),
        });
    }

    Ok(rows)
}

/// Look up a column and cast it to `target`, or `None` when the batch lacks it.
pub fn column_as(batch: &RecordBatch, name: &str, target: &DataType) -> Result<Option<ArrayRef>> {
    let Some(column) = batch.column_by_name(name) else {
        return Ok(None);
    };

    if column.data_type() == target {
        return Ok(Some(Arc::clone(column)));
    }

    cast(column, target)
        .into_app_err_with(|| format!("column '{name}' of type {} cannot be read as {target}", column.data_type()))
        .map(Some)
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<Option<ArrayRef>> {
    column_as(batch, name, &DataType::Utf8)
}

fn int_column(batch: &RecordBatch, name: &str) -> Result<Option<ArrayRef>> {
    column_as(batch, name, &DataType::Int64)
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Option<ArrayRef>> {
    column_as(batch, name, &DataType::Float64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{PackageRecord, RecordState, RecordStatus};
    use crate::stats::{DownloadCounts, StatsOutcome};
    use chrono::DateTime;

    fn sample() -> Snapshot {
        let now = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let mut a = PackageRecord::pending("a", Some("https://pypi.org/simple/a/".to_string()));
        a.apply(StatsOutcome::Valid(DownloadCounts::new(10, 70, 300)), now);
        let mut c = PackageRecord::pending("c", None);
        c.apply(StatsOutcome::NotFound, now);
        Snapshot::from_records([c, PackageRecord::pending("b", None), a])
    }

    #[test]
    fn test_record_batch_layout() {
        let batch = snapshot_to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.schema(), snapshot_schema());

        let names = batch.column(0).as_string::<i32>();
        assert_eq!(names.value(0), "a");
        assert_eq!(names.value(1), "b");
        assert_eq!(names.value(2), "c");

        let statuses = batch.column(5).as_string::<i32>();
        assert_eq!(statuses.value(0), "valid");
        assert_eq!(statuses.value(1), "pending");
        assert_eq!(statuses.value(2), "invalid");

        let last_month = batch.column(4).as_primitive::<Int64Type>();
        assert_eq!(last_month.value(0), 300);
        assert!(last_month.is_null(1));
        assert!(last_month.is_null(2));

        let updated_at = batch.column(6).as_primitive::<Float64Type>();
        assert!((updated_at.value(0) - 1_700_000_000.25).abs() < 1e-6);
        assert!(updated_at.is_null(1));
    }

    #[test]
    fn test_parquet_preserves_snapshot() {
        let snapshot = sample();
        let bytes = write_snapshot_parquet(&snapshot).unwrap();
        let decoded = read_snapshot_parquet(Bytes::from(bytes)).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_empty_snapshot_writes_readable_file() {
        let bytes = write_snapshot_parquet(&Snapshot::new()).unwrap();
        assert!(read_snapshot_parquet(Bytes::from(bytes)).unwrap().is_empty());
    }

    #[test]
    fn test_legacy_float_counts_without_status() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("last_day", DataType::Float64, true),
            Field::new("last_week", DataType::Float64, true),
            Field::new("last_month", DataType::Float64, true),
            Field::new("updated_at", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("x"), Some("y"), None, Some("z")])),
                Arc::new(Float64Array::from(vec![Some(1.0), None, None, None])),
                Arc::new(Float64Array::from(vec![Some(2.0), None, None, None])),
                Arc::new(Float64Array::from(vec![Some(3.0), None, None, None])),
                Arc::new(Float64Array::from(vec![Some(1_700_000_000.0), Some(1_700_000_000.0), None, None])),
            ],
        )
        .unwrap();

        let bytes = encode_parquet(&batch).unwrap();
        let snapshot = read_snapshot_parquet(Bytes::from(bytes)).unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("x").unwrap().counts(), Some(DownloadCounts::new(1, 2, 3)));
        assert_eq!(snapshot.get("y").unwrap().status(), RecordStatus::Invalid);
        assert_eq!(snapshot.get("z").unwrap().state, RecordState::Pending);
        assert_eq!(snapshot.get("x").unwrap().url, None);
    }

    #[test]
    fn test_duplicate_names_keep_first_row() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, true),
            Field::new("updated_at", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["dup", "dup"])),
                Arc::new(StringArray::from(vec![Some("empty"), Some("pending")])),
                Arc::new(Float64Array::from(vec![Some(1_700_000_000.0), None])),
            ],
        )
        .unwrap();

        let snapshot = read_snapshot_parquet(Bytes::from(encode_parquet(&batch).unwrap())).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("dup").unwrap().status(), RecordStatus::Invalid);
    }

    #[test]
    fn test_missing_name_column_fails() {
        let schema = Arc::new(Schema::new(vec![Field::new("other", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1]))]).unwrap();
        let _ = read_snapshot_parquet(Bytes::from(encode_parquet(&batch).unwrap())).unwrap_err();
    }

    #[test]
    fn test_garbage_is_not_parquet() {
        let _ = read_snapshot_parquet(Bytes::from_static(b"definitely not parquet")).unwrap_err();
    }
}
