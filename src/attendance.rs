// ✅ Attendance - Outcomes and the immutable records they produce

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::roster::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Present,
        AttendanceStatus::Late,
        AttendanceStatus::Absent,
    ];

    /// Storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Absent => "absent",
        }
    }

    /// Display label with its badge symbol
    pub fn badge(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "✅ Present",
            AttendanceStatus::Late => "⏰ Late",
            AttendanceStatus::Absent => "❌ Absent",
        }
    }

    /// Human label without decorative symbols (used for exports)
    pub fn label(&self) -> &'static str {
        self.badge()
            .trim_start_matches(|c: char| !c.is_ascii_alphabetic())
            .trim()
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Ok(AttendanceStatus::Present),
            "late" | "l" => Ok(AttendanceStatus::Late),
            "absent" | "a" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status: {}", other)),
        }
    }
}

/// One recorded outcome. Never mutated once written to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: Uuid,
    pub student_name: String,
    pub status: AttendanceStatus,
    pub timestamp: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(student: &Student, status: AttendanceStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            student_id: student.id,
            student_name: student.name.clone(),
            status,
            timestamp,
        }
    }
}
