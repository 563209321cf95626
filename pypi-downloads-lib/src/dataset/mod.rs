//! Package records, snapshots, and the stores that persist them.
//!
//! A [`Snapshot`] is the whole dataset: one [`PackageRecord`] per package, kept
//! in name order. Stores move snapshots to and from a durable location:
//!
//! - [`LocalStore`] keeps `dataset.parquet` in a locked local directory
//! - [`HubStore`] publishes `dataset.parquet` to a Hub dataset repository
//!
//! Both accept an older `dataset.csv` artifact on load when no Parquet file exists,
//! and both decode rows written by earlier versions of the tool (see [`RawRecord`]).

mod csv_table;
pub mod hub;
mod local_store;
mod package_record;
mod raw_record;
mod record_status;
mod snapshot;
mod store;
mod table;

pub use csv_table::{CSV_FILE_NAME, read_snapshot_csv};
pub use hub::HubStore;
pub use local_store::LocalStore;
pub use package_record::{PackageRecord, RecordState, from_unix_seconds, to_unix_seconds};
pub use raw_record::RawRecord;
pub use record_status::RecordStatus;
pub use snapshot::{Snapshot, SnapshotSummary};
pub use store::DatasetStore;
pub use table::{
    PARQUET_FILE_NAME, column_as, decode_parquet, encode_parquet, raw_records_from_batch, read_snapshot_parquet, snapshot_schema,
    snapshot_to_record_batch, write_snapshot_parquet,
};
