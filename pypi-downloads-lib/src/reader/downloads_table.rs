use crate::Result;
use crate::dataset::column_as;
use arrow::array::{Array, AsArray, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef};
use ohno::{IntoAppError, app_err, bail};
use std::sync::Arc;

/// Arrow schema of the published downloads table.
#[must_use]
pub fn downloads_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, false),
        Field::new("last_day", DataType::Int64, false),
        Field::new("last_week", DataType::Int64, false),
        Field::new("last_month", DataType::Int64, false),
    ]))
}

/// One row of the downloads table, detached from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadRow {
    pub name: String,
    pub last_day: u64,
    pub last_week: u64,
    pub last_month: u64,
}

/// One row of the downloads table, borrowed from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DownloadRowRef<'a> {
    pub name: &'a str,
    pub last_day: u64,
    pub last_week: u64,
    pub last_month: u64,
}

impl DownloadRowRef<'_> {
    #[must_use]
    pub fn to_owned_row(&self) -> DownloadRow {
        DownloadRow {
            name: self.name.to_string(),
            last_day: self.last_day,
            last_week: self.last_week,
            last_month: self.last_month,
        }
    }
}

/// Recent download counts of every package with data, backed by immutable Arrow arrays.
///
/// Every accessor takes `&self`; the table cannot be changed once built. Use
/// [`DownloadsTable::to_rows`] for a private, mutable copy.
#[derive(Debug, Clone)]
pub struct DownloadsTable {
    batch: RecordBatch,
    names: StringArray,
    last_day: Int64Array,
    last_week: Int64Array,
    last_month: Int64Array,

    /// Row indices ordered by name, for lookups.
    by_name: Vec<usize>,
}

impl DownloadsTable {
    /// Build a table from record batches holding the four published columns.
    ///
    /// Extra columns are ignored. Counts may be stored as any numeric type, but
    /// nulls, negative counts, and repeated names are rejected.
    pub fn from_batches(batches: &[RecordBatch]) -> Result<Self> {
        let schema = downloads_schema();
        let mut projected = Vec::with_capacity(batches.len());

        for batch in batches {
            let mut columns = Vec::with_capacity(schema.fields().len());
            for field in schema.fields() {
                let column = column_as(batch, field.name(), field.data_type())?
                    .ok_or_else(|| app_err!("downloads table has no '{}' column", field.name()))?;
                if column.null_count() > 0 {
                    bail!("downloads table column '{}' contains nulls", field.name());
                }
                columns.push(column);
            }

            projected.push(RecordBatch::try_new(Arc::clone(&schema), columns).into_app_err("unable to assemble downloads table")?);
        }

        let batch = arrow::compute::concat_batches(&schema, &projected).into_app_err("unable to combine downloads table batches")?;
        Self::try_from_batch(batch)
    }

    fn try_from_batch(batch: RecordBatch) -> Result<Self> {
        let names = batch.column(0).as_string::<i32>().clone();
        let last_day = batch.column(1).as_primitive::<Int64Type>().clone();
        let last_week = batch.column(2).as_primitive::<Int64Type>().clone();
        let last_month = batch.column(3).as_primitive::<Int64Type>().clone();

        for (column, name) in [(&last_day, "last_day"), (&last_week, "last_week"), (&last_month, "last_month")] {
            if column.values().iter().any(|&v| v < 0) {
                bail!("downloads table column '{name}' contains negative counts");
            }
        }

        let mut by_name: Vec<usize> = (0..names.len()).collect();
        by_name.sort_by(|&a, &b| names.value(a).cmp(names.value(b)));

        if let Some(pair) = by_name.windows(2).find(|pair| names.value(pair[0]) == names.value(pair[1])) {
            bail!("downloads table lists '{}' more than once", names.value(pair[0]));
        }

        Ok(Self {
            batch,
            names,
            last_day,
            last_week,
            last_month,
            by_name,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// The row at position `index`, in the order the artifact stores them.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<DownloadRowRef<'_>> {
        (index < self.len()).then(|| self.row_unchecked(index))
    }

    /// The row for package `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<DownloadRowRef<'_>> {
        self.by_name
            .binary_search_by(|&i| self.names.value(i).cmp(name))
            .ok()
            .map(|pos| self.row_unchecked(self.by_name[pos]))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = DownloadRowRef<'_>> + '_ {
        (0..self.len()).map(|i| self.row_unchecked(i))
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        (0..self.len()).map(|i| self.names.value(i))
    }

    /// A detached copy of every row, free to be modified.
    #[must_use]
    pub fn to_rows(&self) -> Vec<DownloadRow> {
        self.iter().map(|row| row.to_owned_row()).collect()
    }

    /// The underlying Arrow data.
    #[must_use]
    pub const fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[expect(clippy::cast_sign_loss, reason = "counts are checked to be non-negative on construction")]
    fn row_unchecked(&self, index: usize) -> DownloadRowRef<'_> {
        DownloadRowRef {
            name: self.names.value(index),
            last_day: self.last_day.value(index) as u64,
            last_week: self.last_week.value(index) as u64,
            last_month: self.last_month.value(index) as u64,
        }
    }
}
