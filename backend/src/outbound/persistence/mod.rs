//! PostgreSQL adapters for the engine ports, built on Diesel.
//!
//! - **Thin adapters**: each repository only translates between rows and
//!   domain types. Progress rules live in the domain.
//! - **Internal models**: `models.rs` and `schema.rs` never leak out of this
//!   module.
//! - **Atomic idempotency**: every insert-if-absent is a single statement
//!   backed by a unique index, so concurrent callers converge on one row.
//!
//! ```ignore
//! use lms_backend::outbound::persistence::{engine_ports, DbPool, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/lms")).await?;
//! let ports = engine_ports(pool);
//! ```

mod diesel_activity_repository;
mod diesel_badge_repository;
mod diesel_course_catalog;
pub(crate) mod diesel_helpers;
mod diesel_profile_repository;
mod diesel_progress_repository;
mod models;
mod pool;
mod schema;

use std::sync::Arc;

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::info;

use crate::domain::ports::EnginePorts;

pub use diesel_activity_repository::DieselActivityRepository;
pub use diesel_badge_repository::DieselBadgeRepository;
pub use diesel_course_catalog::DieselCourseCatalog;
pub use diesel_profile_repository::DieselProfileRepository;
pub use diesel_progress_repository::DieselProgressRepository;
pub use pool::{DbPool, PoolConfig, PoolError};

/// Migrations from `backend/migrations`, compiled into the binary.
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Errors raised while applying schema migrations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MigrationError {
    /// The database could not be reached.
    #[error("failed to connect for migrations: {message}")]
    Connect { message: String },
    /// A migration failed to apply.
    #[error("failed to apply migrations: {message}")]
    Apply { message: String },
}

/// Apply every pending migration, returning the versions applied.
///
/// Blocking: run it on a blocking thread when called from async code.
pub fn run_migrations(database_url: &str) -> Result<Vec<String>, MigrationError> {
    let mut conn = PgConnection::establish(database_url).map_err(|err| MigrationError::Connect {
        message: err.to_string(),
    })?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| MigrationError::Apply {
            message: err.to_string(),
        })?;
    let versions: Vec<String> = applied.iter().map(ToString::to_string).collect();
    info!(count = versions.len(), "applied pending migrations");
    Ok(versions)
}

/// Bundle the Diesel adapters over one shared pool.
pub fn engine_ports(pool: DbPool) -> EnginePorts {
    EnginePorts::new(
        Arc::new(DieselCourseCatalog::new(pool.clone())),
        Arc::new(DieselProgressRepository::new(pool.clone())),
        Arc::new(DieselActivityRepository::new(pool.clone())),
        Arc::new(DieselBadgeRepository::new(pool.clone())),
        Arc::new(DieselProfileRepository::new(pool)),
    )
}
