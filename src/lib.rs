// Roll Call - Core Library
// Weighted student selection, browsable selection history and attendance
// recording. Shared by the TUI/CLI binary, the API server and the tests.

pub mod attendance;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod history;
pub mod roster;
pub mod sampler;
pub mod session;
pub mod stats;
pub mod storage;
pub mod weighting;

// Re-export commonly used types
pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use config::Config;
pub use db::{setup_database, SqliteEventLog, SqliteRosterStore};
pub use error::{InputError, StorageError, StorageResult};
pub use export::{day_range, default_export_name, records_to_csv, write_export};
pub use history::{HistoryEntry, HistoryNavigator, Step};
pub use roster::{import_roster, parse_roster, read_roster_file, Student};
pub use sampler::{pick_at, sample};
pub use session::{Controls, Session, SessionEvent, SessionSettings, SessionState, Severity};
pub use stats::AttendanceStats;
pub use storage::{EventLog, MemoryEventLog, MemoryRosterStore, RosterStore};
pub use weighting::{compute_weights, WeightConfig, WeightedStudent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Open the SQLite-backed roster store and event log for `config`
/// and build a session around them.
pub fn open_session(config: &Config) -> StorageResult<Session<rand::rngs::StdRng>> {
    use rand::SeedableRng;

    let roster_store = SqliteRosterStore::open(&config.database_path)?;
    let event_log = SqliteEventLog::open(&config.database_path)?;

    Ok(Session::new(
        Box::new(roster_store),
        Box::new(event_log),
        rand::rngs::StdRng::from_os_rng(),
        SessionSettings::from(config),
    ))
}
