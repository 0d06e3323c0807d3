// 📤 CSV Export - plain Name,Status,Time header, every data field quoted

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::path::{Path, PathBuf};

use crate::attendance::AttendanceRecord;
use crate::error::{InputError, StorageResult};

/// Spreadsheet tools need the BOM to detect UTF-8 names.
const UTF8_BOM: &str = "\u{feff}";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const HEADER: &str = "Name,Status,Time\n";

/// Render records as CSV text (no BOM).
pub fn records_to_csv(records: &[AttendanceRecord]) -> StorageResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .has_headers(false)
        .from_writer(HEADER.as_bytes().to_vec());

    for record in records {
        let time = record
            .timestamp
            .with_timezone(&Local)
            .format(TIME_FORMAT)
            .to_string();
        writer.write_record([record.student_name.as_str(), record.status.label(), time.as_str()])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Default file name: roll-call-records_<YYYY-MM-DD>.csv
pub fn default_export_name(today: NaiveDate) -> String {
    format!("roll-call-records_{}.csv", today.format("%Y-%m-%d"))
}

/// Write records to `path` with a UTF-8 BOM. An empty list is an input error.
pub fn write_export(path: &Path, records: &[AttendanceRecord]) -> anyhow::Result<PathBuf> {
    if records.is_empty() {
        return Err(InputError::NothingToExport.into());
    }

    let body = records_to_csv(records)?;
    std::fs::write(path, format!("{}{}", UTF8_BOM, body))?;

    tracing::info!(path = %path.display(), count = records.len(), "records exported");
    Ok(path.to_path_buf())
}

/// Whole local days `start..=end` as a UTC range.
pub fn day_range(start: NaiveDate, end: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let from = local_to_utc(start.and_time(NaiveTime::MIN));
    let until = local_to_utc(
        end.and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or_else(|| end.and_time(NaiveTime::MIN)),
    );
    (from, until)
}

fn local_to_utc(naive: chrono::NaiveDateTime) -> DateTime<Utc> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceStatus;
    use crate::roster::Student;

    fn sample_records() -> Vec<AttendanceRecord> {
        let alice = Student::new("Alice");
        let bob = Student::new("Bob \"The Builder\"");
        let now = Utc::now();

        vec![
            AttendanceRecord::new(&alice, AttendanceStatus::Present, now),
            AttendanceRecord::new(&bob, AttendanceStatus::Late, now),
            AttendanceRecord::new(&alice, AttendanceStatus::Absent, now),
        ]
    }

    #[test]
    fn test_header_and_quoted_rows() {
        let csv_text = records_to_csv(&sample_records()).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Name,Status,Time");
        assert!(lines[1].starts_with("\"Alice\",\"Present\",\""));
        assert!(lines[2].starts_with("\"Bob \"\"The Builder\"\"\",\"Late\",\""));
        assert!(lines[3].starts_with("\"Alice\",\"Absent\",\""));
    }

    #[test]
    fn test_header_only_when_no_rows() {
        assert_eq!(records_to_csv(&[]).unwrap(), "Name,Status,Time\n");
    }

    #[test]
    fn test_status_labels_have_no_symbols() {
        let csv_text = records_to_csv(&sample_records()).unwrap();
        assert!(!csv_text.contains('✅'));
        assert!(!csv_text.contains('⏰'));
        assert!(!csv_text.contains('❌'));
    }

    #[test]
    fn test_write_export_adds_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        write_export(&path, &sample_records()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(UTF8_BOM));
        assert!(content.starts_with(&format!("{}Name,Status,Time\n\"Alice\"", UTF8_BOM)));
    }

    #[test]
    fn test_empty_export_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        let err = write_export(&path, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InputError>(),
            Some(InputError::NothingToExport)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_day_range_covers_whole_end_day() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (from, until) = day_range(day, day);

        assert!(from < until);
        let span = until - from;
        assert!(span >= chrono::Duration::hours(22) && span <= chrono::Duration::hours(25));
    }

    #[test]
    fn test_default_export_name() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        assert_eq!(default_export_name(day), "roll-call-records_2026-10-17.csv");
    }
}
