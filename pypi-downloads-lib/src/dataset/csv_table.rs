use super::{RawRecord, Snapshot};
use crate::Result;
use ohno::{IntoAppError, bail};

/// Older artifact name, accepted when the Parquet artifact is missing.
pub const CSV_FILE_NAME: &str = "dataset.csv";

/// Decode a CSV artifact into a snapshot.
///
/// Columns are located by header name; unknown columns are ignored. Empty cells
/// are nulls. Counts may be written as integers or as floats such as `300.0`.
pub fn read_snapshot_csv(data: &[u8]) -> Result<Snapshot> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
    let headers = reader.headers().into_app_err("unable to read CSV header")?.clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let Some(name_col) = position("name") else {
        bail!("dataset has no 'name' column");
    };
    let url_col = position("url");
    let last_day_col = position("last_day");
    let last_week_col = position("last_week");
    let last_month_col = position("last_month");
    let status_col = position("status");
    let updated_at_col = position("updated_at");

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.into_app_err_with(|| format!("malformed CSV row {}", line + 2))?;
        let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).map(str::trim).filter(|s| !s.is_empty());

        let Some(name) = cell(Some(name_col)) else {
            continue;
        };

        rows.push(RawRecord {
            name: name.to_string(),
            url: cell(url_col).map(ToString::to_string),
            last_day: cell(last_day_col).and_then(parse_count),
            last_week: cell(last_week_col).and_then(parse_count),
            last_month: cell(last_month_col).and_then(parse_count),
            status: cell(status_col).map(ToString::to_string),
            updated_at: cell(updated_at_col).and_then(|s| s.parse::<f64>().ok()),
        });
    }

    Ok(Snapshot::from_records(rows.into_iter().map(RawRecord::into_record)))
}

#[expect(clippy::cast_possible_truncation, reason = "only integral values in i64 range get here")]
fn parse_count(s: &str) -> Option<i64> {
    const LIMIT: f64 = 9.0e18;

    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }

    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract().abs() < f64::EPSILON && f.abs() < LIMIT).then(|| f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::RecordStatus;
    use crate::stats::DownloadCounts;

    #[test]
    fn test_read_current_layout() {
        let csv = "name,url,last_day,last_week,last_month,status,updated_at\n\
                   a,https://pypi.org/simple/a/,10,70,300,valid,1700000000.0\n\
                   b,,,,,pending,\n\
                   c,,,,,invalid,1700000000.5\n";
        let snapshot = read_snapshot_csv(csv.as_bytes()).unwrap();

        assert_eq!(snapshot.len(), 3);
        let a = snapshot.get("a").unwrap();
        assert_eq!(a.counts(), Some(DownloadCounts::new(10, 70, 300)));
        assert_eq!(a.url.as_deref(), Some("https://pypi.org/simple/a/"));
        assert_eq!(snapshot.get("b").unwrap().status(), RecordStatus::Pending);
        assert_eq!(snapshot.get("c").unwrap().status(), RecordStatus::Invalid);
    }

    #[test]
    fn test_read_legacy_layout() {
        let csv = "name,last_day,last_week,last_month,updated_at\n\
                   w,,,300,1700000000\n\
                   x,1.0,2.0,3.0,1700000000\n\
                   y,,,,1700000000\n\
                   z,,,,\n";
        let snapshot = read_snapshot_csv(csv.as_bytes()).unwrap();

        assert_eq!(snapshot.get("w").unwrap().counts(), Some(DownloadCounts::new(0, 0, 300)));
        assert_eq!(snapshot.get("x").unwrap().counts(), Some(DownloadCounts::new(1, 2, 3)));
        assert_eq!(snapshot.get("y").unwrap().status(), RecordStatus::Invalid);
        assert_eq!(snapshot.get("z").unwrap().status(), RecordStatus::Pending);
    }

    #[test]
    fn test_empty_status_spelling() {
        let csv = "name,status,updated_at\nq,empty,1700000000\n";
        let snapshot = read_snapshot_csv(csv.as_bytes()).unwrap();
        assert_eq!(snapshot.get("q").unwrap().status(), RecordStatus::Invalid);
    }

    #[test]
    fn test_missing_name_column_fails() {
        let _ = read_snapshot_csv(b"package,last_day\nq,1\n").unwrap_err();
    }

    #[test]
    fn test_header_only() {
        assert!(read_snapshot_csv(b"name,status\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("42.0"), Some(42));
        assert_eq!(parse_count("42.5"), None);
        assert_eq!(parse_count("nan"), None);
        assert_eq!(parse_count("abc"), None);
    }
}
