//! Port for assignment submissions and quiz attempts.

use async_trait::async_trait;
use serde_json::json;

use crate::domain::activity::{AssignmentSubmission, QuizAnswer, QuizAttempt};
use crate::domain::ids::{AssignmentId, AttemptId, QuizId, StudentId, SubmissionId};
use crate::domain::Error;

use super::define_port_error;

define_port_error! {
    /// Errors raised by activity repository adapters.
    pub enum ActivityRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "activity repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "activity repository query failed: {message}",
        /// A different attempt already completed the same quiz.
        AttemptAlreadyCompleted { attempt_id: AttemptId } =>
            "quiz already completed by attempt {attempt_id}",
    }
}

/// Persistence for activity facts that feed course progress.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Find a submission by id.
    async fn find_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<AssignmentSubmission>, ActivityRepositoryError>;

    /// Upsert a submission on `(assignment_id, student_id)`.
    ///
    /// A stored grade is never cleared: when `submission.marks` is `None`
    /// the stored marks survive. Returns the stored row.
    async fn save_submission(
        &self,
        submission: &AssignmentSubmission,
    ) -> Result<AssignmentSubmission, ActivityRepositoryError>;

    /// Number of distinct `assignment_ids` with a graded submission.
    async fn count_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<u64, ActivityRepositoryError>;

    /// Graded submissions for `assignment_ids`.
    async fn list_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<Vec<AssignmentSubmission>, ActivityRepositoryError>;

    /// Insert a new, incomplete attempt.
    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), ActivityRepositoryError>;

    /// Find an attempt by id.
    async fn find_attempt(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<QuizAttempt>, ActivityRepositoryError>;

    /// Every attempt a student has made at a quiz, oldest first.
    async fn list_attempts(
        &self,
        student_id: &StudentId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError>;

    /// Store answers for an attempt. Answers already stored for the same
    /// question are kept.
    async fn save_answers(&self, answers: &[QuizAnswer]) -> Result<(), ActivityRepositoryError>;

    /// Persist a completed attempt, inserting it when unknown.
    ///
    /// Re-recording the same completed attempt returns the stored row.
    /// Fails with [`ActivityRepositoryError::AttemptAlreadyCompleted`] when
    /// another attempt already completed the quiz for this student.
    async fn record_completed_attempt(
        &self,
        attempt: &QuizAttempt,
    ) -> Result<QuizAttempt, ActivityRepositoryError>;

    /// Number of distinct `quiz_ids` with a completed attempt.
    async fn count_completed_quizzes(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<u64, ActivityRepositoryError>;

    /// Completed attempts for `quiz_ids`.
    async fn list_completed_attempts(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError>;
}

impl From<ActivityRepositoryError> for Error {
    fn from(err: ActivityRepositoryError) -> Self {
        match err {
            ActivityRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("activity repository unavailable: {message}"))
            }
            ActivityRepositoryError::Query { message } => {
                Error::internal(format!("activity repository error: {message}"))
            }
            ActivityRepositoryError::AttemptAlreadyCompleted { attempt_id } => {
                Error::precondition_failed("quiz has already been completed").with_details(
                    json!({ "code": "quiz_already_completed", "attemptId": attempt_id }),
                )
            }
        }
    }
}
