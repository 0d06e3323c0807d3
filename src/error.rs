// ⚠️ Error Types
// Input problems abort an operation, storage problems never do.

use thiserror::Error;

/// Problems with what the user handed us (roster text, files, export ranges).
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no file selected")]
    NoFile,

    #[error("unsupported file type: {0} (expected .csv or .txt)")]
    UnsupportedFileType(String),

    #[error("roster contains no student names")]
    EmptyRoster,

    #[error("no records to export")]
    NothingToExport,

    #[error("failed to read roster file: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid weight settings: {0}")]
    InvalidWeights(String),
}

/// Failures of the roster store or the event log.
///
/// These are logged and surfaced as warnings; in-memory state stays authoritative.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
