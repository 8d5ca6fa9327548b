//! Shared helpers for the backend integration tests.
//!
//! Each file under `backend/tests/` compiles as its own crate, so helpers
//! used by more than one suite live here.

pub mod cluster_skip;
pub mod embedded_postgres;
pub mod seed;

pub use cluster_skip::handle_cluster_setup_failure;
pub use embedded_postgres::provision_template_database;

/// Render a `postgres` error with its SQLSTATE and detail.
///
/// `postgres::Error` displays most server errors as `db error`, which is
/// useless in CI logs.
pub fn format_postgres_error(error: &postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut summary = format!(
        "postgres error {:?}: {}",
        db_error.code(),
        db_error.message()
    );
    if let Some(detail) = db_error.detail() {
        summary.push_str("; detail: ");
        summary.push_str(detail);
    }
    if let Some(constraint) = db_error.constraint() {
        summary.push_str("; constraint: ");
        summary.push_str(constraint);
    }
    summary
}
