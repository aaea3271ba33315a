//! sqlx error classification
//!
//! Storage failures are split into transient ones (connectivity, pool
//! exhaustion, serialization conflicts), which surface as `AppError::Pool`
//! and may be retried, and permanent ones.

use consulta_core::AppError;
use tracing::error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map a sqlx error to the application error, logging it with `context`
pub fn map_sqlx(context: &str, err: sqlx::Error) -> AppError {
    error!("Database error ({}): {}", context, err);

    match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::Pool(format!("{}: {}", context, err)),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => AppError::AlreadyExists(context.to_string()),
            Some(FOREIGN_KEY_VIOLATION) => {
                AppError::NotFound(format!("{}: referenced record does not exist", context))
            }
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                AppError::Pool(format!("{}: {}", context, err))
            }
            _ => AppError::Database(format!("{}: {}", context, err)),
        },
        _ => AppError::Database(format!("{}: {}", context, err)),
    }
}

/// Map a failed `BEGIN`
pub fn begin_failed(err: sqlx::Error) -> AppError {
    match map_sqlx("begin transaction", err) {
        AppError::Database(msg) => AppError::Transaction(msg),
        other => other,
    }
}

/// Map a failed `COMMIT`
pub fn commit_failed(err: sqlx::Error) -> AppError {
    match map_sqlx("commit transaction", err) {
        AppError::Database(msg) => AppError::Transaction(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(map_sqlx("find call", sqlx::Error::PoolTimedOut).is_transient());
        assert!(map_sqlx("find call", sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_row_not_found_is_permanent() {
        let err = map_sqlx("find call", sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_commit_failure_maps_to_transaction() {
        let err = commit_failed(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Transaction(_)));
        assert!(commit_failed(sqlx::Error::PoolTimedOut).is_transient());
    }
}
