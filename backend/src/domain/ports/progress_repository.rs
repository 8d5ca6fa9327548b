//! Port for enrollments and lesson/module completion state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ids::{CourseId, LessonId, ModuleId, StudentId};
use crate::domain::percentage::Percentage;
use crate::domain::progress::{Enrollment, LessonProgress, ModuleProgress, ModuleProgressWrite};
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by progress repository adapters.
    pub enum ProgressRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "progress repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "progress repository query failed: {message}",
    }
}

/// Result of an insert-if-absent on enrollments.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentInsert {
    /// The stored row, whether or not this call created it.
    pub enrollment: Enrollment,
    /// Whether this call created the row.
    pub created: bool,
}

/// Persistence for per-student completion state.
///
/// Every `*_if_absent` and `find_or_create_*` operation must be atomic:
/// concurrent callers with the same key observe a single row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert the enrollment unless one exists for the same student and
    /// course.
    async fn insert_enrollment_if_absent(
        &self,
        enrollment: &Enrollment,
    ) -> Result<EnrollmentInsert, ProgressRepositoryError>;

    /// Find an enrollment.
    async fn find_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, ProgressRepositoryError>;

    /// Raise the stored course progress of an existing enrollment to
    /// `progress`. A lower value leaves the row untouched. Returns the
    /// stored value.
    async fn update_enrollment_progress(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
        progress: Percentage,
    ) -> Result<Percentage, ProgressRepositoryError>;

    /// Every enrollment a student holds.
    async fn list_enrollments_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<Enrollment>, ProgressRepositoryError>;

    /// Number of distinct students enrolled in any of `course_ids`.
    async fn count_distinct_students(
        &self,
        course_ids: &[CourseId],
    ) -> Result<u64, ProgressRepositoryError>;

    /// Mark a lesson complete, creating the row when absent. An already
    /// completed row is returned untouched.
    async fn complete_lesson(
        &self,
        student_id: &StudentId,
        lesson_id: &LessonId,
        completed_at: DateTime<Utc>,
    ) -> Result<LessonProgress, ProgressRepositoryError>;

    /// Number of `lesson_ids` the student has completed.
    async fn count_completed_lessons(
        &self,
        student_id: &StudentId,
        lesson_ids: &[LessonId],
    ) -> Result<u64, ProgressRepositoryError>;

    /// Load the module progress row, inserting a pending one when absent.
    async fn find_or_create_module_progress(
        &self,
        student_id: &StudentId,
        module_id: &ModuleId,
    ) -> Result<ModuleProgress, ProgressRepositoryError>;

    /// Merge `progress` into the stored row with [`ModuleProgress::merge`],
    /// creating the row when absent.
    ///
    /// The read and write must be atomic so that of several concurrent
    /// writers exactly one reports `completed_now`.
    async fn save_module_progress(
        &self,
        progress: &ModuleProgress,
    ) -> Result<ModuleProgressWrite, ProgressRepositoryError>;

    /// Number of modules the student has completed across all courses.
    async fn count_completed_modules(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, ProgressRepositoryError>;
}

impl From<ProgressRepositoryError> for Error {
    fn from(err: ProgressRepositoryError) -> Self {
        match err {
            ProgressRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("progress repository unavailable: {message}"))
            }
            ProgressRepositoryError::Query { message } => {
                Error::internal(format!("progress repository error: {message}"))
            }
        }
    }
}
