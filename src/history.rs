// 🧭 History Navigator
// Past selections plus a cursor. Selecting after stepping back drops the
// entries ahead of the cursor, the same way browser history branches.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::roster::Student;

/// A student snapshot taken when they were selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub student: Student,
    pub selected_at: DateTime<Utc>,
}

/// Result of stepping forward.
#[derive(Debug, PartialEq)]
pub enum Step<'a> {
    /// Cursor moved onto an existing entry
    Moved(&'a HistoryEntry),
    /// Nothing ahead of the cursor: the caller should roll a new student
    AtEnd,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryNavigator {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `student` the current selection.
    ///
    /// Returns false (and changes nothing) when the student is already current.
    pub fn record_selection(&mut self, student: &Student, at: DateTime<Utc>) -> bool {
        if self
            .current()
            .is_some_and(|entry| entry.student.id == student.id)
        {
            return false;
        }

        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }

        self.entries.push(HistoryEntry {
            student: student.clone(),
            selected_at: at,
        });
        self.cursor = Some(self.entries.len() - 1);

        true
    }

    /// Step back one entry. None when already at the start (or empty).
    pub fn previous(&mut self) -> Option<&HistoryEntry> {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                self.entries.get(cursor - 1)
            }
            _ => None,
        }
    }

    /// Step forward one entry, or report that a fresh roll is needed.
    pub fn next(&mut self) -> Step<'_> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                Step::Moved(&self.entries[cursor + 1])
            }
            _ => Step::AtEnd,
        }
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|cursor| self.entries.get(cursor))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    /// True when stepping forward replays an existing entry.
    pub fn has_forward(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    /// "Next" is available when it can replay, or when it can roll a new student.
    pub fn has_next(&self, roster_non_empty: bool) -> bool {
        self.has_forward() || roster_non_empty
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(history: &HistoryNavigator) -> Vec<&str> {
        history
            .entries()
            .iter()
            .map(|entry| entry.student.name.as_str())
            .collect()
    }

    fn select_all(history: &mut HistoryNavigator, students: &[&Student]) {
        for student in students {
            history.record_selection(student, Utc::now());
        }
    }

    #[test]
    fn test_empty_history() {
        let mut history = HistoryNavigator::new();

        assert!(history.current().is_none());
        assert!(history.previous().is_none());
        assert_eq!(history.next(), Step::AtEnd);
        assert!(!history.has_previous());
        assert!(!history.has_next(false));
        assert!(history.has_next(true));
    }

    #[test]
    fn test_selections_append_and_move_cursor() {
        let (a, b, c) = (Student::new("A"), Student::new("B"), Student::new("C"));
        let mut history = HistoryNavigator::new();
        select_all(&mut history, &[&a, &b, &c]);

        assert_eq!(names(&history), vec!["A", "B", "C"]);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.current().unwrap().student.id, c.id);
        assert!(history.has_previous());
        assert!(!history.has_forward());
    }

    #[test]
    fn test_branching_truncates_forward_entries() {
        let (a, b, c, d) = (
            Student::new("A"),
            Student::new("B"),
            Student::new("C"),
            Student::new("D"),
        );
        let mut history = HistoryNavigator::new();
        select_all(&mut history, &[&a, &b, &c]);

        assert_eq!(history.previous().unwrap().student.name, "B");
        assert_eq!(history.previous().unwrap().student.name, "A");
        assert!(history.has_forward());

        assert!(history.record_selection(&d, Utc::now()));

        assert_eq!(names(&history), vec!["A", "D"]);
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(history.current().unwrap().student.name, "D");
    }

    #[test]
    fn test_repeat_selection_of_current_is_ignored() {
        let a = Student::new("A");
        let mut history = HistoryNavigator::new();

        assert!(history.record_selection(&a, Utc::now()));
        assert!(!history.record_selection(&a, Utc::now()));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_same_student_later_is_a_new_entry() {
        let (a, b) = (Student::new("A"), Student::new("B"));
        let mut history = HistoryNavigator::new();
        select_all(&mut history, &[&a, &b, &a]);

        assert_eq!(names(&history), vec!["A", "B", "A"]);
    }

    #[test]
    fn test_forward_replays_then_reports_end() {
        let (a, b) = (Student::new("A"), Student::new("B"));
        let mut history = HistoryNavigator::new();
        select_all(&mut history, &[&a, &b]);

        history.previous();
        match history.next() {
            Step::Moved(entry) => assert_eq!(entry.student.name, "B"),
            Step::AtEnd => panic!("expected to replay B"),
        }
        assert_eq!(history.next(), Step::AtEnd);
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn test_previous_stops_at_first_entry() {
        let a = Student::new("A");
        let mut history = HistoryNavigator::new();
        history.record_selection(&a, Utc::now());

        assert!(history.previous().is_none());
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn test_entries_are_snapshots() {
        let mut a = Student::new("A");
        let mut history = HistoryNavigator::new();
        history.record_selection(&a, Utc::now());

        a.late_count = 5;
        assert_eq!(history.current().unwrap().student.late_count, 0);
    }

    #[test]
    fn test_clear_resets_cursor() {
        let a = Student::new("A");
        let mut history = HistoryNavigator::new();
        history.record_selection(&a, Utc::now());

        history.clear();
        assert!(history.is_empty());
        assert!(history.cursor().is_none());
    }
}
