//! Shared helpers for the Diesel adapters.
//!
//! - Error mapping from pool and Diesel errors into port errors
//! - Checked casts between Postgres integer columns and domain counters
//! - Row collection with first-error short-circuiting

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use crate::domain::Percentage;

use super::pool::PoolError;

/// Extract a readable message from a pool error.
pub(crate) fn map_pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

/// Map a Diesel error into a port error, emitting debug context.
///
/// Closed connections map through `connection`; everything else through
/// `query`.
pub(crate) fn map_diesel_error<E>(
    error: DieselError,
    operation: &str,
    query: impl FnOnce(String) -> E,
    connection: impl FnOnce(String) -> E,
) -> E {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            %operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => query(format!("{operation}: record not found")),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            connection(info.message().to_owned())
        }
        DieselError::DatabaseError(_, info) => query(format!("{operation}: {}", info.message())),
        other => query(format!("{operation}: {other}")),
    }
}

/// Whether `error` is a unique constraint violation.
pub(crate) fn is_unique_violation(error: &DieselError) -> bool {
    matches!(
        error,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Collect row conversion results, mapping the first error through `map_err`.
pub(crate) fn collect_rows<T, E>(
    results: impl Iterator<Item = Result<T, String>>,
    map_err: impl FnOnce(String) -> E,
) -> Result<Vec<T>, E> {
    results.collect::<Result<Vec<_>, _>>().map_err(map_err)
}

/// Convert a domain mark or score into an `INTEGER` column value.
pub(crate) fn int_to_db(value: u32, field: &str) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("{field} {value} exceeds column range"))
}

/// Convert an `INTEGER` column value into a domain mark or score.
pub(crate) fn int_from_db(value: i32, field: &str) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("{field} {value} is negative"))
}

/// Convert a domain counter into a `BIGINT` column value.
pub(crate) fn count_to_db(value: u64, field: &str) -> Result<i64, String> {
    i64::try_from(value).map_err(|_| format!("{field} {value} exceeds column range"))
}

/// Convert a `BIGINT` column value or `COUNT(*)` result into a counter.
pub(crate) fn count_from_db(value: i64, field: &str) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("{field} {value} is negative"))
}

/// Convert a `DOUBLE PRECISION` column value into a percentage.
pub(crate) fn percentage_from_db(value: f64, field: &str) -> Result<Percentage, String> {
    Percentage::try_new(value).map_err(|err| format!("{field}: {err}"))
}
