//! Port for reading course structure.

use async_trait::async_trait;

use crate::domain::course::{CourseItem, CourseOutline};
use crate::domain::ids::{CourseId, InstructorId};
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by course catalog adapters.
    pub enum CourseCatalogError {
        /// Catalog connection could not be established.
        Connection { message: String } =>
            "course catalog connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "course catalog query failed: {message}",
    }
}

/// Read-only access to authored courses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Load a course outline by id.
    async fn find_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseOutline>, CourseCatalogError>;

    /// Load the outline of the course that owns `item`.
    async fn find_course_containing(
        &self,
        item: CourseItem,
    ) -> Result<Option<CourseOutline>, CourseCatalogError>;

    /// Ids of every course an instructor owns.
    async fn list_courses_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Vec<CourseId>, CourseCatalogError>;
}

impl From<CourseCatalogError> for Error {
    fn from(err: CourseCatalogError) -> Self {
        match err {
            CourseCatalogError::Connection { message } => {
                Error::service_unavailable(format!("course catalog unavailable: {message}"))
            }
            CourseCatalogError::Query { message } => {
                Error::internal(format!("course catalog error: {message}"))
            }
        }
    }
}
