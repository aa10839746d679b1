//! Store error types.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::database::models::FileId;

/// Errors surfaced by the tag store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE, foreign key, CHECK or trigger constraint rejected a write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[source] rusqlite::Error),

    #[error("transaction failed: {0}")]
    TransactionFailure(#[source] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid fingerprint: {0:?}")]
    InvalidFingerprint(String),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tags were created but linking them to the file failed. Repeating the
    /// tagging call finishes the job without creating the tags again.
    #[error("tagging file {file_id} left {} new tag(s) unlinked: {source}", .created.len())]
    PartialTagging {
        file_id: FileId,
        created: Vec<String>,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Whether retrying the call that produced this error can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::ConstraintViolation(_) | StoreError::PartialTagging { .. }
        )
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            StoreError::ConstraintViolation(err)
        } else {
            StoreError::TransactionFailure(err)
        }
    }
}

/// Returns true when `err` is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn unique_failure() -> rusqlite::Error {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (name TEXT UNIQUE NOT NULL); INSERT INTO t VALUES ('a');")
            .unwrap();
        conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err()
    }

    #[test]
    fn test_unique_failure_is_constraint_violation() {
        let err = unique_failure();
        assert!(is_unique_violation(&err));

        let err = StoreError::from(err);
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_failures_are_transaction_failures() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute("INSERT INTO missing VALUES (1)", []).unwrap_err();
        assert!(!is_unique_violation(&err));

        let err = StoreError::from(err);
        assert!(matches!(err, StoreError::TransactionFailure(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_partial_tagging_message() {
        let err = StoreError::PartialTagging {
            file_id: FileId(7),
            created: vec!["x".to_string(), "y".to_string()],
            source: Box::new(StoreError::NotFound("file 7".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("tagging file 7 left 2 new tag(s) unlinked"));
        assert!(err.is_recoverable());
    }
}
