// 🗄️ SQLite persistence
// students: the current roster (replaced wholesale on save)
// attendance_records: append-only event log

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use uuid::Uuid;

use crate::attendance::{AttendanceRecord, AttendanceStatus};
use crate::error::{StorageError, StorageResult};
use crate::roster::Student;
use crate::storage::{EventLog, RosterStore};

pub fn setup_database(conn: &Connection) -> StorageResult<()> {
    // Enable WAL mode for crash recovery (no-op for in-memory databases)
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    // ==========================================================================
    // Students Table (roster, position keeps import order)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id TEXT PRIMARY KEY NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            roll_count INTEGER NOT NULL DEFAULT 0,
            present_count INTEGER NOT NULL DEFAULT 0,
            late_count INTEGER NOT NULL DEFAULT 0,
            absent_count INTEGER NOT NULL DEFAULT 0,
            last_roll_time TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Attendance Records Table (event log, append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL,
            student_name TEXT NOT NULL,
            status TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_timestamp ON attendance_records(timestamp)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_student ON attendance_records(student_id)",
        [],
    )?;

    Ok(())
}

/// Fixed-width UTC timestamps so string order matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp {:?}: {}", raw, e)))
}

fn parse_id(raw: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StorageError::Corrupt(format!("bad student id {:?}: {}", raw, e)))
}

// ============================================================================
// ROSTER
// ============================================================================

pub fn save_students(conn: &mut Connection, students: &[Student]) -> StorageResult<()> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM students", [])?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO students (
                id, position, name, roll_count, present_count, late_count, absent_count, last_roll_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for (position, student) in students.iter().enumerate() {
            stmt.execute(params![
                student.id.to_string(),
                position as i64,
                student.name,
                student.roll_count,
                student.present_count,
                student.late_count,
                student.absent_count,
                student.last_roll_time.map(format_timestamp),
            ])?;
        }
    }

    tx.commit()?;
    tracing::debug!(count = students.len(), "roster saved");

    Ok(())
}

pub fn load_students(conn: &Connection) -> StorageResult<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, roll_count, present_count, late_count, absent_count, last_roll_time
         FROM students
         ORDER BY position",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u32>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, name, roll_count, present_count, late_count, absent_count, last_roll_time)| {
            Ok(Student {
                id: parse_id(&id)?,
                name,
                roll_count,
                present_count,
                late_count,
                absent_count,
                last_roll_time: last_roll_time.as_deref().map(parse_timestamp).transpose()?,
            })
        })
        .collect()
}

// ============================================================================
// ATTENDANCE RECORDS
// ============================================================================

pub fn insert_record(conn: &Connection, record: &AttendanceRecord) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO attendance_records (student_id, student_name, status, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.student_id.to_string(),
            record.student_name,
            record.status.as_str(),
            format_timestamp(record.timestamp),
        ],
    )?;

    Ok(())
}

pub fn get_records_in_range(
    conn: &Connection,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> StorageResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, student_name, status, timestamp
         FROM attendance_records
         WHERE (?1 IS NULL OR timestamp >= ?1)
           AND (?2 IS NULL OR timestamp <= ?2)
         ORDER BY timestamp, id",
    )?;

    let rows = stmt
        .query_map(
            params![start.map(format_timestamp), end.map(format_timestamp)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(student_id, student_name, status, timestamp)| {
            Ok(AttendanceRecord {
                student_id: parse_id(&student_id)?,
                student_name,
                status: status
                    .parse::<AttendanceStatus>()
                    .map_err(StorageError::Corrupt)?,
                timestamp: parse_timestamp(&timestamp)?,
            })
        })
        .collect()
}

pub fn clear_records(conn: &Connection) -> StorageResult<usize> {
    let removed = conn.execute("DELETE FROM attendance_records", [])?;
    tracing::info!(removed, "attendance records cleared");
    Ok(removed)
}

pub fn count_records(conn: &Connection) -> StorageResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM attendance_records", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// TRAIT IMPLEMENTATIONS
// ============================================================================

fn open(path: &Path) -> StorageResult<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    Ok(conn)
}

/// Roster store backed by the `students` table.
pub struct SqliteRosterStore {
    conn: Connection,
}

impl SqliteRosterStore {
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self { conn: open(path)? })
    }

    pub fn from_connection(conn: Connection) -> StorageResult<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }
}

impl RosterStore for SqliteRosterStore {
    fn load(&self) -> StorageResult<Vec<Student>> {
        load_students(&self.conn)
    }

    fn save(&mut self, students: &[Student]) -> StorageResult<()> {
        save_students(&mut self.conn, students)
    }
}

/// Event log backed by the `attendance_records` table.
pub struct SqliteEventLog {
    conn: Connection,
}

impl SqliteEventLog {
    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self { conn: open(path)? })
    }

    pub fn from_connection(conn: Connection) -> StorageResult<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> StorageResult<i64> {
        count_records(&self.conn)
    }
}

impl EventLog for SqliteEventLog {
    fn append(&mut self, record: &AttendanceRecord) -> StorageResult<()> {
        insert_record(&self.conn, record)
    }

    fn query_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> StorageResult<Vec<AttendanceRecord>> {
        get_records_in_range(&self.conn, start, end)
    }

    fn clear(&mut self) -> StorageResult<()> {
        clear_records(&self.conn).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_roster_round_trip_keeps_order_and_counters() {
        let mut conn = memory_conn();
        let now = Utc::now();

        let mut students = vec![Student::new("Zoe"), Student::new("Adam"), Student::new("Mia")];
        students[1].record_outcome(AttendanceStatus::Late, now);

        save_students(&mut conn, &students).unwrap();
        let loaded = load_students(&conn).unwrap();

        let names: Vec<&str> = loaded.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Zoe", "Adam", "Mia"]);
        assert_eq!(loaded[1].id, students[1].id);
        assert_eq!(loaded[1].late_count, 1);
        assert_eq!(loaded[1].roll_count, 1);
        assert!(loaded[1].last_roll_time.is_some());
        assert!(loaded[0].last_roll_time.is_none());
    }

    #[test]
    fn test_save_replaces_previous_roster() {
        let mut conn = memory_conn();

        save_students(&mut conn, &[Student::new("Old 1"), Student::new("Old 2")]).unwrap();
        save_students(&mut conn, &[Student::new("New")]).unwrap();

        let loaded = load_students(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "New");
    }

    #[test]
    fn test_event_log_append_query_clear() {
        let conn = memory_conn();
        let student = Student::new("Alice");
        let t0 = Utc::now() - Duration::days(10);

        for (days, status) in [
            (0, AttendanceStatus::Present),
            (3, AttendanceStatus::Late),
            (7, AttendanceStatus::Absent),
        ] {
            let record = AttendanceRecord::new(&student, status, t0 + Duration::days(days));
            insert_record(&conn, &record).unwrap();
        }

        assert_eq!(count_records(&conn).unwrap(), 3);

        let all = get_records_in_range(&conn, None, None).unwrap();
        let statuses: Vec<AttendanceStatus> = all.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![AttendanceStatus::Present, AttendanceStatus::Late, AttendanceStatus::Absent]
        );
        assert_eq!(all[0].student_id, student.id);
        assert_eq!(all[0].student_name, "Alice");

        let middle = get_records_in_range(
            &conn,
            Some(t0 + Duration::days(1)),
            Some(t0 + Duration::days(5)),
        )
        .unwrap();
        assert_eq!(middle.len(), 1);
        assert_eq!(middle[0].status, AttendanceStatus::Late);

        let since = get_records_in_range(&conn, Some(t0 + Duration::days(3)), None).unwrap();
        assert_eq!(since.len(), 2);

        assert_eq!(clear_records(&conn).unwrap(), 3);
        assert_eq!(count_records(&conn).unwrap(), 0);
    }

    #[test]
    fn test_trait_stores_on_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roll-call.db");

        let mut roster = SqliteRosterStore::open(&path).unwrap();
        let mut log = SqliteEventLog::open(&path).unwrap();

        let students = vec![Student::new("Alice")];
        roster.save(&students).unwrap();
        log.append(&AttendanceRecord::new(&students[0], AttendanceStatus::Present, Utc::now()))
            .unwrap();

        let reopened = SqliteRosterStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap()[0].id, students[0].id);
        assert_eq!(log.count().unwrap(), 1);
        assert_eq!(log.query_range(None, None).unwrap().len(), 1);
    }
}
