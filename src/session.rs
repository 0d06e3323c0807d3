// 🎯 Roll Call Session
// Owns the roster and the selection history, drives the roll/outcome state
// machine, and reports back to the UI through a queue of events.
//
// States:
//   Idle            nothing pending (no selection yet, or outcome recorded)
//   Rolling         "start roll" pressed, name revealed on the first tick after reveal_at
//   AwaitingOutcome a student is shown and can be marked present/late/absent
//   AutoRolling     a new student is rolled every interval until cancelled

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::attendance::{AttendanceRecord, AttendanceStatus};
use crate::config::Config;
use crate::error::InputError;
use crate::export;
use crate::history::{HistoryEntry, HistoryNavigator, Step};
use crate::roster::{self, Student};
use crate::sampler;
use crate::stats::AttendanceStats;
use crate::storage::{EventLog, RosterStore};
use crate::weighting::WeightConfig;

/// Undrained events beyond this are dropped, oldest first.
pub const MAX_QUEUED_EVENTS: usize = 256;

// ============================================================================
// STATE & EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Rolling {
        reveal_at: Instant,
    },
    AwaitingOutcome,
    AutoRolling {
        next_roll_at: Instant,
        awaiting_outcome: bool,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Rolling { .. } => "rolling",
            SessionState::AwaitingOutcome => "awaiting_outcome",
            SessionState::AutoRolling { .. } => "auto_rolling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StudentSelected {
        student: Student,
        /// true when navigating history rather than rolling
        replay: bool,
    },
    OutcomeRecorded {
        record: AttendanceRecord,
    },
    StatsUpdated {
        stats: AttendanceStats,
    },
    Notification {
        message: String,
        severity: Severity,
    },
}

/// Which controls the UI should enable, derived from state, history and roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Controls {
    pub start_roll: bool,
    pub mark: bool,
    pub next: bool,
    pub previous: bool,
    pub auto_roll: bool,
    pub auto_rolling: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub reveal_delay: Duration,
    pub auto_roll_interval: Duration,
    pub weights: WeightConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            reveal_delay: config.reveal_delay(),
            auto_roll_interval: config.auto_roll_interval(),
            weights: config.weights,
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session<R: Rng> {
    students: Vec<Student>,
    history: HistoryNavigator,
    state: SessionState,
    roster_store: Box<dyn RosterStore>,
    event_log: Box<dyn EventLog>,
    rng: R,
    settings: SessionSettings,
    events: VecDeque<SessionEvent>,
}

impl<R: Rng> Session<R> {
    /// Build a session, loading whatever roster the store holds.
    pub fn new(
        roster_store: Box<dyn RosterStore>,
        event_log: Box<dyn EventLog>,
        rng: R,
        settings: SessionSettings,
    ) -> Self {
        let mut session = Self {
            students: Vec::new(),
            history: HistoryNavigator::new(),
            state: SessionState::Idle,
            roster_store,
            event_log,
            rng,
            settings,
            events: VecDeque::new(),
        };

        match session.roster_store.load() {
            Ok(students) => {
                tracing::info!(count = students.len(), "roster loaded");
                session.students = students;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load roster, starting empty");
                session.notify(format!("Could not load saved roster: {}", e), Severity::Warning);
            }
        }

        session
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn history(&self) -> &HistoryNavigator {
        &self.history
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.history.current()
    }

    pub fn stats(&self) -> AttendanceStats {
        AttendanceStats::from_roster(&self.students)
    }

    pub fn awaiting_outcome(&self) -> bool {
        match self.state {
            SessionState::AwaitingOutcome => true,
            SessionState::AutoRolling {
                awaiting_outcome, ..
            } => awaiting_outcome,
            _ => false,
        }
    }

    pub fn controls(&self) -> Controls {
        let has_students = !self.students.is_empty();
        let rolling = matches!(self.state, SessionState::Rolling { .. });

        Controls {
            start_roll: has_students && !rolling,
            mark: self.awaiting_outcome() && self.history.current().is_some(),
            next: !rolling && self.history.has_next(has_students),
            previous: !rolling && self.history.has_previous(),
            auto_roll: has_students,
            auto_rolling: matches!(self.state, SessionState::AutoRolling { .. }),
        }
    }

    /// Take every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    // ------------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------------

    /// Replace the roster with the names in `raw`. History is cleared.
    pub fn import_roster(&mut self, raw: &str) -> Result<usize, InputError> {
        let students = match roster::import_roster(raw) {
            Ok(students) => students,
            Err(e) => {
                tracing::warn!(error = %e, "roster import rejected");
                self.notify(format!("Import failed: {}", e), Severity::Error);
                return Err(e);
            }
        };

        let count = students.len();
        self.students = students;
        self.history.clear();
        self.state = SessionState::Idle;
        self.persist_roster();

        tracing::info!(count, "roster imported");
        self.notify(format!("Imported {} students", count), Severity::Success);
        self.emit_stats();

        Ok(count)
    }

    /// Read a `.csv`/`.txt` roster file and import it.
    pub fn import_roster_file(&mut self, path: &Path) -> Result<usize, InputError> {
        match roster::read_roster_file(path) {
            Ok(raw) => self.import_roster(&raw),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "roster file rejected");
                self.notify(format!("Import failed: {}", e), Severity::Error);
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Rolling
    // ------------------------------------------------------------------------

    /// Begin a roll. With a reveal delay the pick happens on a later tick.
    pub fn start_roll(&mut self, now: Instant) -> bool {
        if self.students.is_empty() {
            self.notify("Import a roster first", Severity::Warning);
            return false;
        }

        match self.state {
            SessionState::Rolling { .. } => false,
            SessionState::AutoRolling { next_roll_at, .. } => {
                let picked = self.select_student();
                self.state = SessionState::AutoRolling {
                    next_roll_at,
                    awaiting_outcome: picked,
                };
                picked
            }
            SessionState::Idle | SessionState::AwaitingOutcome => {
                if self.settings.reveal_delay.is_zero() {
                    return self.complete_roll();
                }

                self.state = SessionState::Rolling {
                    reveal_at: now + self.settings.reveal_delay,
                };
                tracing::debug!("roll started");
                self.notify("Selecting a student...", Severity::Info);
                true
            }
        }
    }

    /// Advance timers: reveal a pending roll, fire a due auto-roll.
    ///
    /// Returns true when a student was selected.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            SessionState::Rolling { reveal_at } if now >= reveal_at => self.complete_roll(),
            SessionState::AutoRolling { next_roll_at, .. } if now >= next_roll_at => {
                self.fire_auto_roll(now)
            }
            _ => false,
        }
    }

    fn complete_roll(&mut self) -> bool {
        let picked = self.select_student();
        self.state = if picked {
            SessionState::AwaitingOutcome
        } else {
            SessionState::Idle
        };
        picked
    }

    fn fire_auto_roll(&mut self, now: Instant) -> bool {
        // Cancellation may have happened between scheduling and firing.
        if !matches!(self.state, SessionState::AutoRolling { .. }) {
            return false;
        }

        if self.students.is_empty() {
            self.stop_auto_roll();
            return false;
        }

        let picked = self.select_student();
        self.state = SessionState::AutoRolling {
            next_roll_at: now + self.settings.auto_roll_interval,
            awaiting_outcome: picked,
        };
        picked
    }

    /// Weigh, sample and push the pick onto the history.
    fn select_student(&mut self) -> bool {
        let weighted = self.settings.weights.weigh(&self.students, Utc::now());

        let student = match sampler::sample(&weighted, &mut self.rng) {
            Some(entry) => entry.student.clone(),
            None => {
                self.notify("Import a roster first", Severity::Warning);
                return false;
            }
        };

        self.history.record_selection(&student, Utc::now());
        tracing::info!(student = %student.name, history_len = self.history.len(), "student selected");

        self.notify(
            format!("Choose an outcome for {}", student.name),
            Severity::Info,
        );
        self.push_event(SessionEvent::StudentSelected {
            student,
            replay: false,
        });
        true
    }

    // ------------------------------------------------------------------------
    // Outcomes
    // ------------------------------------------------------------------------

    /// Record an outcome for the current student.
    pub fn mark_attendance(&mut self, status: AttendanceStatus) -> Option<AttendanceRecord> {
        let current = if self.awaiting_outcome() {
            self.history.current().map(|entry| entry.student.clone())
        } else {
            None
        };
        let current = match current {
            Some(student) => student,
            None => {
                self.notify("No student selected", Severity::Warning);
                return None;
            }
        };

        let index = match self.students.iter().position(|s| s.id == current.id) {
            Some(index) => index,
            None => {
                tracing::warn!(student = %current.name, "current student missing from roster");
                self.notify(
                    format!("{} is no longer on the roster", current.name),
                    Severity::Warning,
                );
                return None;
            }
        };

        let now = Utc::now();
        let record = AttendanceRecord::new(&self.students[index], status, now);

        if let Err(e) = self.event_log.append(&record) {
            tracing::warn!(error = %e, "failed to append attendance record");
            self.notify(format!("Record not saved: {}", e), Severity::Warning);
        }

        self.students[index].record_outcome(status, now);
        self.persist_roster();

        self.state = match self.state {
            SessionState::AutoRolling { next_roll_at, .. } => SessionState::AutoRolling {
                next_roll_at,
                awaiting_outcome: false,
            },
            _ => SessionState::Idle,
        };

        tracing::info!(student = %record.student_name, status = status.as_str(), "attendance recorded");
        self.notify(
            format!("{} marked as {}", record.student_name, status.label()),
            Severity::Success,
        );
        self.push_event(SessionEvent::OutcomeRecorded {
            record: record.clone(),
        });
        self.emit_stats();

        Some(record)
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Replay the next history entry, or roll a new student at the end.
    pub fn go_next(&mut self, now: Instant) -> bool {
        if matches!(self.state, SessionState::Rolling { .. }) {
            return false;
        }

        let replayed = match self.history.next() {
            Step::Moved(entry) => Some(entry.student.clone()),
            Step::AtEnd => None,
        };

        match replayed {
            Some(student) => {
                self.show_replayed(student, "Next");
                true
            }
            None => self.start_roll(now),
        }
    }

    /// Replay the previous history entry.
    pub fn go_previous(&mut self) -> bool {
        if matches!(self.state, SessionState::Rolling { .. }) {
            return false;
        }

        let student = match self.history.previous().map(|entry| entry.student.clone()) {
            Some(student) => student,
            None => {
                self.notify("No previous student", Severity::Info);
                return false;
            }
        };

        self.show_replayed(student, "Previous");
        true
    }

    fn show_replayed(&mut self, student: Student, direction: &str) {
        self.state = match self.state {
            SessionState::AutoRolling { next_roll_at, .. } => SessionState::AutoRolling {
                next_roll_at,
                awaiting_outcome: true,
            },
            _ => SessionState::AwaitingOutcome,
        };

        tracing::debug!(student = %student.name, direction, "history replay");
        self.notify(format!("{}: {}", direction, student.name), Severity::Info);
        self.push_event(SessionEvent::StudentSelected {
            student,
            replay: true,
        });
    }

    // ------------------------------------------------------------------------
    // Auto roll
    // ------------------------------------------------------------------------

    /// Start or stop auto-roll. Returns whether auto-roll is now active.
    pub fn toggle_auto_roll(&mut self, now: Instant) -> bool {
        if matches!(self.state, SessionState::AutoRolling { .. }) {
            self.stop_auto_roll();
            false
        } else {
            self.start_auto_roll(now)
        }
    }

    /// Roll immediately, then again every interval.
    pub fn start_auto_roll(&mut self, now: Instant) -> bool {
        if self.students.is_empty() {
            self.notify("Import a roster first", Severity::Warning);
            return false;
        }
        if matches!(self.state, SessionState::AutoRolling { .. }) {
            return true;
        }

        // Any pending manual reveal is superseded by the immediate auto roll.
        self.state = SessionState::AutoRolling {
            next_roll_at: now,
            awaiting_outcome: false,
        };
        tracing::info!(interval_ms = self.settings.auto_roll_interval.as_millis() as u64, "auto roll started");
        self.notify("Auto roll started", Severity::Success);
        self.fire_auto_roll(now);
        true
    }

    /// Cancel auto-roll; the pending firing is dropped with the state. Idempotent.
    pub fn stop_auto_roll(&mut self) {
        if let SessionState::AutoRolling {
            awaiting_outcome, ..
        } = self.state
        {
            self.state = if awaiting_outcome {
                SessionState::AwaitingOutcome
            } else {
                SessionState::Idle
            };
            tracing::info!("auto roll stopped");
            self.notify("Auto roll stopped", Severity::Info);
        }
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    /// Records in range, oldest first. Storage failures yield an empty list.
    pub fn records_in_range(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<AttendanceRecord> {
        match self.event_log.query_range(start, end) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "failed to query attendance records");
                self.notify(format!("Could not read records: {}", e), Severity::Warning);
                Vec::new()
            }
        }
    }

    /// Newest records first, at most `limit`.
    pub fn recent_records(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Vec<AttendanceRecord> {
        let mut records = self.records_in_range(start, end);
        records.reverse();
        records.truncate(limit);
        records
    }

    /// Write the records in range to `path` as CSV.
    pub fn export_range(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        path: &Path,
    ) -> Option<PathBuf> {
        let records = self.records_in_range(start, end);

        if records.is_empty() {
            self.notify(InputError::NothingToExport.to_string(), Severity::Warning);
            return None;
        }

        match export::write_export(path, &records) {
            Ok(written) => {
                self.notify(
                    format!("Exported {} records to {}", records.len(), written.display()),
                    Severity::Success,
                );
                Some(written)
            }
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                self.notify(format!("Export failed: {}", e), Severity::Error);
                None
            }
        }
    }

    /// Empty the attendance log and zero every counter. Names and ids stay.
    pub fn clear_all(&mut self) {
        if let Err(e) = self.event_log.clear() {
            tracing::warn!(error = %e, "failed to clear attendance records");
            self.notify(format!("Records not cleared on disk: {}", e), Severity::Warning);
        }

        roster::reset_roster(&mut self.students);
        self.persist_roster();

        tracing::info!("all records cleared");
        self.notify("All records cleared", Severity::Success);
        self.emit_stats();
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn persist_roster(&mut self) {
        if let Err(e) = self.roster_store.save(&self.students) {
            tracing::warn!(error = %e, "failed to save roster");
            self.notify(format!("Roster not saved: {}", e), Severity::Warning);
        }
    }

    fn emit_stats(&mut self) {
        let stats = self.stats();
        self.push_event(SessionEvent::StatsUpdated { stats });
    }

    fn push_event(&mut self, event: SessionEvent) {
        while self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.push_event(SessionEvent::Notification {
            message: message.into(),
            severity,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================
