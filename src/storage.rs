// 💾 Storage Collaborators
// The session talks to persistence only through these two traits.
// SQLite implementations live in db.rs; in-memory ones are here.

use chrono::{DateTime, Utc};

use crate::attendance::AttendanceRecord;
use crate::error::StorageResult;
use crate::roster::Student;

/// Key-value style store holding the whole roster.
pub trait RosterStore: Send {
    /// The stored roster, or an empty list if nothing was saved yet.
    fn load(&self) -> StorageResult<Vec<Student>>;

    /// Replace the stored roster.
    fn save(&mut self, students: &[Student]) -> StorageResult<()>;
}

/// Append-only log of attendance records.
pub trait EventLog: Send {
    fn append(&mut self, record: &AttendanceRecord) -> StorageResult<()>;

    /// Records with start <= timestamp <= end (open bounds when None),
    /// oldest first.
    fn query_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<AttendanceRecord>>;

    fn clear(&mut self) -> StorageResult<()>;
}

pub(crate) fn in_range(
    timestamp: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    start.map_or(true, |start| timestamp >= start) && end.map_or(true, |end| timestamp <= end)
}

// ============================================================================
// IN-MEMORY IMPLEMENTATIONS
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryRosterStore {
    students: Vec<Student>,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_students(students: Vec<Student>) -> Self {
        Self { students }
    }
}

impl RosterStore for MemoryRosterStore {
    fn load(&self) -> StorageResult<Vec<Student>> {
        Ok(self.students.clone())
    }

    fn save(&mut self, students: &[Student]) -> StorageResult<()> {
        self.students = students.to_vec();
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    records: Vec<AttendanceRecord>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLog for MemoryEventLog {
    fn append(&mut self, record: &AttendanceRecord) -> StorageResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn query_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<AttendanceRecord>> {
        let mut records: Vec<AttendanceRecord> = self
            .records
            .iter()
            .filter(|record| in_range(record.timestamp, start, end))
            .cloned()
            .collect();
        records.sort_by_key(|record| record.timestamp);
        Ok(records)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.records.clear();
        Ok(())
    }
}
