//! Domain ports for the hexagonal boundary.
//!
//! Services depend only on these traits; `outbound::memory` and
//! `outbound::persistence` provide the adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod activity_repository;
mod badge_repository;
mod bundle;
mod course_catalog;
mod profile_repository;
mod progress_repository;

#[cfg(test)]
pub use activity_repository::MockActivityRepository;
pub use activity_repository::{ActivityRepository, ActivityRepositoryError};
#[cfg(test)]
pub use badge_repository::MockBadgeRepository;
pub use badge_repository::{BadgeRepository, BadgeRepositoryError, CatalogEntry};
pub use bundle::EnginePorts;
#[cfg(test)]
pub use course_catalog::MockCourseCatalog;
pub use course_catalog::{CourseCatalog, CourseCatalogError};
#[cfg(test)]
pub use profile_repository::MockProfileRepository;
pub use profile_repository::{ProfileRepository, ProfileRepositoryError};
#[cfg(test)]
pub use progress_repository::MockProgressRepository;
pub use progress_repository::{EnrollmentInsert, ProgressRepository, ProgressRepositoryError};
