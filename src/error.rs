//! Error types for the table engine.
//!
//! Detection ambiguity, search misses and unparsable sort keys are not
//! errors; they degrade to the plain fallback model, `Ok(None)` and a
//! minimal sort key respectively.

use thiserror::Error;

/// Errors reported by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A mark taken before the last reload was used against the new table.
    #[error("mark belongs to table generation {mark}, current generation is {current}")]
    StaleMark { mark: u64, current: u64 },

    #[error("row {row} is out of range (table has {rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    #[error("column {column} does not exist (table has {columns} columns)")]
    ColumnOutOfRange { column: usize, columns: usize },

    #[error("search pattern is empty")]
    EmptyPattern,

    /// The selected search region is empty or lies outside the table.
    #[error("search region is empty or outside the table")]
    InvalidRegion,

    #[error("sorting is not available for expanded records")]
    SortUnsupported,

    /// A cooperative interrupt was raised while the operation was running.
    #[error("operation cancelled")]
    Interrupted,

    /// The search pattern could not be compiled (size limits).
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_mark_message_names_both_generations() {
        let err = EngineError::StaleMark {
            mark: 1,
            current: 3,
        };
        assert_eq!(
            err.to_string(),
            "mark belongs to table generation 1, current generation is 3"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
