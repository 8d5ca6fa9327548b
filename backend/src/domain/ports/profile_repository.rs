//! Port for denormalised profile rollups.

use async_trait::async_trait;

use crate::domain::ids::{InstructorId, StudentId};
use crate::domain::profiles::{InstructorProfile, StudentProfile};
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by profile repository adapters.
    pub enum ProfileRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "profile repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "profile repository query failed: {message}",
    }
}

/// Persistence for profile rollups. Saves are upserts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Create or overwrite a student profile.
    async fn save_student_profile(
        &self,
        profile: &StudentProfile,
    ) -> Result<(), ProfileRepositoryError>;

    /// Find a student profile.
    async fn find_student_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentProfile>, ProfileRepositoryError>;

    /// Create or overwrite an instructor profile.
    async fn save_instructor_profile(
        &self,
        profile: &InstructorProfile,
    ) -> Result<(), ProfileRepositoryError>;

    /// Find an instructor profile.
    async fn find_instructor_profile(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Option<InstructorProfile>, ProfileRepositoryError>;
}

impl From<ProfileRepositoryError> for Error {
    fn from(err: ProfileRepositoryError) -> Self {
        match err {
            ProfileRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("profile repository unavailable: {message}"))
            }
            ProfileRepositoryError::Query { message } => {
                Error::internal(format!("profile repository error: {message}"))
            }
        }
    }
}
