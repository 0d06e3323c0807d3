// 📊 Aggregate Statistics - derived from a roster snapshot, never stored

use serde::Serialize;

use crate::roster::Student;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub student_count: usize,
    pub total_rolls: u32,
    /// Whole percentages, 0 when nothing has been recorded
    pub attendance_rate: u32,
    pub late_rate: u32,
    pub absent_rate: u32,
}

impl AttendanceStats {
    pub fn from_roster(students: &[Student]) -> Self {
        let total_rolls: u32 = students.iter().map(|s| s.roll_count).sum();
        let present: u32 = students.iter().map(|s| s.present_count).sum();
        let late: u32 = students.iter().map(|s| s.late_count).sum();
        let absent: u32 = students.iter().map(|s| s.absent_count).sum();

        Self {
            student_count: students.len(),
            total_rolls,
            attendance_rate: percentage(present, total_rolls),
            late_rate: percentage(late, total_rolls),
            absent_rate: percentage(absent, total_rolls),
        }
    }
}

/// round(100 * part / total), 0 for an empty total
pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * part as f64 / total as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceStatus;
    use chrono::Utc;

    #[test]
    fn test_empty_roster_has_zero_rates() {
        let stats = AttendanceStats::from_roster(&[]);
        assert_eq!(stats, AttendanceStats::default());
    }

    #[test]
    fn test_rates_are_rounded_percentages() {
        let now = Utc::now();
        let mut alice = Student::new("Alice");
        let mut bob = Student::new("Bob");

        alice.record_outcome(AttendanceStatus::Present, now);
        alice.record_outcome(AttendanceStatus::Present, now);
        bob.record_outcome(AttendanceStatus::Late, now);

        let stats = AttendanceStats::from_roster(&[alice, bob]);

        assert_eq!(stats.student_count, 2);
        assert_eq!(stats.total_rolls, 3);
        assert_eq!(stats.attendance_rate, 67);
        assert_eq!(stats.late_rate, 33);
        assert_eq!(stats.absent_rate, 0);
    }

    #[test]
    fn test_percentage_edges() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(5, 5), 100);
    }
}
