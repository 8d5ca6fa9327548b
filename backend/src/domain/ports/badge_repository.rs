//! Port for the badge catalog and award facts.

use async_trait::async_trait;

use crate::domain::badges::{AwardOutcome, Badge, BadgeDefinition, NewStudentBadge, StudentBadge};
use crate::domain::ids::{BadgeId, InstructorId, StudentId};
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by badge repository adapters.
    pub enum BadgeRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "badge repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "badge repository query failed: {message}",
    }
}

/// Result of a catalog find-or-seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub badge: Badge,
    /// Whether this call seeded the entry.
    pub created: bool,
}

/// Persistence for badges and awards.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    /// Find the entry keyed by the definition's `(badge_type, name)`,
    /// seeding it atomically when absent.
    async fn find_or_seed(
        &self,
        definition: &BadgeDefinition,
    ) -> Result<CatalogEntry, BadgeRepositoryError>;

    /// Find a catalog entry by id.
    async fn find_badge(&self, badge_id: &BadgeId) -> Result<Option<Badge>, BadgeRepositoryError>;

    /// Insert the award unless one exists for the same student, badge and
    /// scope.
    async fn insert_award_if_absent(
        &self,
        award: &NewStudentBadge,
    ) -> Result<AwardOutcome, BadgeRepositoryError>;

    /// Every award a student holds, oldest first.
    async fn list_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<StudentBadge>, BadgeRepositoryError>;

    /// Number of awards a student holds.
    async fn count_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, BadgeRepositoryError>;

    /// Number of awards an instructor has granted by hand.
    async fn count_awards_by_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<u64, BadgeRepositoryError>;
}

impl From<BadgeRepositoryError> for Error {
    fn from(err: BadgeRepositoryError) -> Self {
        match err {
            BadgeRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("badge repository unavailable: {message}"))
            }
            BadgeRepositoryError::Query { message } => {
                Error::internal(format!("badge repository error: {message}"))
            }
        }
    }
}
