// 👥 Roster - Students and their cumulative attendance counters
// Importing a roster always replaces the previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::attendance::AttendanceStatus;
use crate::error::InputError;

// ============================================================================
// STUDENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Stable identity, survives counter resets
    pub id: Uuid,

    pub name: String,

    /// Number of outcomes recorded for this student
    pub roll_count: u32,
    pub present_count: u32,
    pub late_count: u32,
    pub absent_count: u32,

    /// When an outcome was last recorded (None = never called)
    pub last_roll_time: Option<DateTime<Utc>>,
}

impl Student {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            roll_count: 0,
            present_count: 0,
            late_count: 0,
            absent_count: 0,
            last_roll_time: None,
        }
    }

    /// Apply one outcome: bump the roll count and exactly one status counter.
    pub fn record_outcome(&mut self, status: AttendanceStatus, at: DateTime<Utc>) {
        self.roll_count += 1;
        self.last_roll_time = Some(at);

        match status {
            AttendanceStatus::Present => self.present_count += 1,
            AttendanceStatus::Late => self.late_count += 1,
            AttendanceStatus::Absent => self.absent_count += 1,
        }
    }

    /// Zero all counters, keeping id and name.
    pub fn reset_counters(&mut self) {
        self.roll_count = 0;
        self.present_count = 0;
        self.late_count = 0;
        self.absent_count = 0;
        self.last_roll_time = None;
    }

    /// roll_count must equal the sum of the three status counters
    pub fn is_consistent(&self) -> bool {
        self.roll_count == self.present_count + self.late_count + self.absent_count
    }

    pub fn was_called(&self) -> bool {
        self.last_roll_time.is_some()
    }
}

// ============================================================================
// IMPORTER
// ============================================================================

/// Split raw roster text into names.
///
/// One name per non-blank line. Whitespace and one matching pair of surrounding
/// `"`/`'` quotes are stripped; duplicates are kept as distinct entries.
pub fn parse_roster(raw: &str) -> Vec<String> {
    raw.lines()
        .map(clean_name)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean_name(line: &str) -> &str {
    let line = line.trim();

    for quote in ['"', '\''] {
        if let Some(inner) = line
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }

    line
}

/// Parse roster text into fresh students with zeroed counters.
pub fn import_roster(raw: &str) -> Result<Vec<Student>, InputError> {
    let names = parse_roster(raw);

    if names.is_empty() {
        return Err(InputError::EmptyRoster);
    }

    Ok(names.into_iter().map(Student::new).collect())
}

/// Read a roster file, accepting only `.csv` and `.txt` lists.
pub fn read_roster_file(path: &Path) -> Result<String, InputError> {
    if path.as_os_str().is_empty() {
        return Err(InputError::NoFile);
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if extension != "csv" && extension != "txt" {
        return Err(InputError::UnsupportedFileType(path.display().to_string()));
    }

    Ok(std::fs::read_to_string(path)?)
}

/// Zero every student's counters (identity and names are kept).
pub fn reset_roster(students: &mut [Student]) {
    for student in students.iter_mut() {
        student.reset_counters();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_roster_trims_and_unquotes() {
        let students = import_roster("Alice\n\"Bob\"\n\n  \nCarol").unwrap();

        let names: Vec<&str> = students.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);

        for student in &students {
            assert_eq!(student.roll_count, 0);
            assert_eq!(student.present_count, 0);
            assert_eq!(student.late_count, 0);
            assert_eq!(student.absent_count, 0);
            assert!(student.last_roll_time.is_none());
        }
    }

    #[test]
    fn test_parse_roster_handles_crlf_and_single_quotes() {
        let names = parse_roster("  'Dana'  \r\n\"Eli\"\r\n");
        assert_eq!(names, vec!["Dana", "Eli"]);
    }

    #[test]
    fn test_inner_apostrophe_is_kept() {
        let names = parse_roster("\"Shannon O'Neil\"");
        assert_eq!(names, vec!["Shannon O'Neil"]);
    }

    #[test]
    fn test_only_one_matching_quote_pair_is_stripped() {
        let names = parse_roster("''Bob\"\n\"'Ann'\"\n\"\"Cy\"\"\n'Dee\"");
        assert_eq!(names, vec!["''Bob\"", "'Ann'", "\"Cy\"", "'Dee\""]);
    }

    #[test]
    fn test_duplicate_names_become_distinct_students() {
        let students = import_roster("Sam\nSam").unwrap();

        assert_eq!(students.len(), 2);
        assert_ne!(students[0].id, students[1].id);
    }

    #[test]
    fn test_blank_roster_is_rejected() {
        let result = import_roster("\n   \n\"\"\n");
        assert!(matches!(result, Err(InputError::EmptyRoster)));
    }

    #[test]
    fn test_record_outcome_keeps_counters_consistent() {
        let mut student = Student::new("Alice");
        let now = Utc::now();

        student.record_outcome(AttendanceStatus::Present, now);
        student.record_outcome(AttendanceStatus::Late, now);
        student.record_outcome(AttendanceStatus::Absent, now);
        student.record_outcome(AttendanceStatus::Late, now);

        assert_eq!(student.roll_count, 4);
        assert_eq!(student.present_count, 1);
        assert_eq!(student.late_count, 2);
        assert_eq!(student.absent_count, 1);
        assert_eq!(student.last_roll_time, Some(now));
        assert!(student.is_consistent());
    }

    #[test]
    fn test_reset_keeps_identity() {
        let mut students = import_roster("Alice\nBob").unwrap();
        let ids: Vec<Uuid> = students.iter().map(|s| s.id).collect();
        students[0].record_outcome(AttendanceStatus::Absent, Utc::now());

        reset_roster(&mut students);

        assert_eq!(students.iter().map(|s| s.id).collect::<Vec<_>>(), ids);
        assert_eq!(students[0].name, "Alice");
        assert_eq!(students[0].roll_count, 0);
        assert_eq!(students[0].absent_count, 0);
        assert!(!students[0].was_called());
    }

    #[test]
    fn test_read_roster_file_checks_extension() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("class.csv");
        let mut file = std::fs::File::create(&good).unwrap();
        writeln!(file, "Alice\nBob").unwrap();
        assert_eq!(read_roster_file(&good).unwrap().trim(), "Alice\nBob");

        let bad = dir.path().join("class.xlsx");
        std::fs::write(&bad, "Alice").unwrap();
        assert!(matches!(
            read_roster_file(&bad),
            Err(InputError::UnsupportedFileType(_))
        ));

        assert!(matches!(
            read_roster_file(Path::new("")),
            Err(InputError::NoFile)
        ));
    }
}
