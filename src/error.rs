// ⛔ Configuration errors - the only fatal class in a migration run
//
// Data-quality problems are report entries, never errors. Anything in here
// aborts the run before the first record is read.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required top-level section is absent from the data-formats file
    #[error("Missing configuration section: {0}")]
    MissingSection(String),

    /// The gazetteer table has the wrong shape at the given path
    #[error("Malformed gazetteer at {path}: {reason}")]
    MalformedGazetteer { path: String, reason: String },

    /// No column mapping was declared for a legacy table
    #[error("No column index declared for table '{0}'")]
    MissingTable(String),

    /// A table mapping lacks a column the ingestion needs
    #[error("Table '{table}' has no index for required column '{column}'")]
    MissingColumn { table: String, column: String },

    /// Two columns of one table point at the same index
    #[error("Table '{table}' maps columns '{first}' and '{second}' to the same index {index}")]
    DuplicateColumnIndex {
        table: String,
        first: String,
        second: String,
        index: usize,
    },

    /// Source data is narrower than the mapping expects
    #[error("Table '{table}' has {width} columns but column '{column}' expects index {index}")]
    ColumnOutOfRange {
        table: String,
        column: String,
        index: usize,
        width: usize,
    },

    /// Report settings that would make truncation meaningless
    #[error("Invalid report settings: {0}")]
    InvalidReportSettings(String),
}
