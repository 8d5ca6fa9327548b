//! PostgreSQL-backed assignment submissions and quiz attempts.
//!
//! Submissions are unique per `(assignment_id, student_id)`. Completed
//! attempts are unique per `(quiz_id, student_id)` through a partial index,
//! so a lost race surfaces as a unique violation that maps back to
//! [`ActivityRepositoryError::AttemptAlreadyCompleted`].

use async_trait::async_trait;
use diesel::dsl::count_distinct;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::activity::{AssignmentSubmission, QuizAnswer, QuizAttempt};
use crate::domain::ids::{AssignmentId, AttemptId, QuizId, StudentId, SubmissionId};
use crate::domain::ports::{ActivityRepository, ActivityRepositoryError};

use super::diesel_helpers::{
    collect_rows, count_from_db, int_from_db, int_to_db, is_unique_violation, map_diesel_error,
    map_pool_error_message,
};
use super::models::{AttemptRow, NewQuizAnswerRow, NewSubmissionRow, SubmissionRow};
use super::pool::{DbPool, PoolError};
use super::schema::{assignment_submissions, quiz_answers, quiz_attempts};

/// Diesel-backed implementation of [`ActivityRepository`].
#[derive(Clone)]
pub struct DieselActivityRepository {
    pool: DbPool,
}

impl DieselActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ActivityRepositoryError {
    ActivityRepositoryError::connection(map_pool_error_message(error))
}

fn map_query_error(error: diesel::result::Error, operation: &str) -> ActivityRepositoryError {
    map_diesel_error(
        error,
        operation,
        ActivityRepositoryError::query,
        ActivityRepositoryError::connection,
    )
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().copied().map(Into::into).collect()
}

/// Failure inside the record-completed-attempt transaction.
enum RecordAttemptError {
    Diesel(diesel::result::Error),
    CompletedElsewhere(Uuid),
}

impl From<diesel::result::Error> for RecordAttemptError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

fn row_to_submission(row: SubmissionRow) -> Result<AssignmentSubmission, String> {
    Ok(AssignmentSubmission {
        id: row.id.into(),
        assignment_id: row.assignment_id.into(),
        student_id: row.student_id.into(),
        marks: row
            .marks
            .map(|marks| int_from_db(marks, "submission marks"))
            .transpose()?,
        feedback: row.feedback,
        submitted_at: row.submitted_at,
        graded_at: row.graded_at,
    })
}

fn submission_to_row(submission: &AssignmentSubmission) -> Result<NewSubmissionRow<'_>, String> {
    Ok(NewSubmissionRow {
        id: *submission.id.as_uuid(),
        assignment_id: *submission.assignment_id.as_uuid(),
        student_id: *submission.student_id.as_uuid(),
        marks: submission
            .marks
            .map(|marks| int_to_db(marks, "submission marks"))
            .transpose()?,
        feedback: submission.feedback.as_deref(),
        submitted_at: submission.submitted_at,
        graded_at: submission.graded_at,
    })
}

fn row_to_attempt(row: AttemptRow) -> Result<QuizAttempt, String> {
    Ok(QuizAttempt {
        id: row.id.into(),
        quiz_id: row.quiz_id.into(),
        student_id: row.student_id.into(),
        score: int_from_db(row.score, "attempt score")?,
        is_completed: row.is_completed,
        started_at: row.started_at,
        submitted_at: row.submitted_at,
    })
}

fn attempt_to_row(attempt: &QuizAttempt) -> Result<AttemptRow, String> {
    Ok(AttemptRow {
        id: *attempt.id.as_uuid(),
        quiz_id: *attempt.quiz_id.as_uuid(),
        student_id: *attempt.student_id.as_uuid(),
        score: int_to_db(attempt.score, "attempt score")?,
        is_completed: attempt.is_completed,
        started_at: attempt.started_at,
        submitted_at: attempt.submitted_at,
    })
}

fn answer_to_row(answer: &QuizAnswer) -> NewQuizAnswerRow {
    NewQuizAnswerRow {
        attempt_id: *answer.attempt_id.as_uuid(),
        question_id: *answer.question_id.as_uuid(),
        selected_option: answer.selected.as_str(),
        is_correct: answer.is_correct,
    }
}

// ---------------------------------------------------------------------------
// Completed attempt recording
// ---------------------------------------------------------------------------

/// Store `row` as the completed attempt for its quiz and student.
async fn record_completed(
    conn: &mut AsyncPgConnection,
    row: AttemptRow,
) -> Result<AttemptRow, RecordAttemptError> {
    conn.transaction(|conn| {
        async move {
            let other: Option<Uuid> = quiz_attempts::table
                .filter(quiz_attempts::quiz_id.eq(row.quiz_id))
                .filter(quiz_attempts::student_id.eq(row.student_id))
                .filter(quiz_attempts::is_completed.eq(true))
                .filter(quiz_attempts::id.ne(row.id))
                .select(quiz_attempts::id)
                .first(conn)
                .await
                .optional()?;
            if let Some(other) = other {
                return Err(RecordAttemptError::CompletedElsewhere(other));
            }

            let existing: Option<AttemptRow> = quiz_attempts::table
                .find(row.id)
                .select(AttemptRow::as_select())
                .for_update()
                .first(conn)
                .await
                .optional()?;
            if let Some(existing) = existing.filter(|stored| stored.is_completed) {
                return Ok(existing);
            }

            let stored = diesel::insert_into(quiz_attempts::table)
                .values(&row)
                .on_conflict(quiz_attempts::id)
                .do_update()
                .set((
                    quiz_attempts::score.eq(excluded(quiz_attempts::score)),
                    quiz_attempts::is_completed.eq(true),
                    quiz_attempts::submitted_at.eq(excluded(quiz_attempts::submitted_at)),
                ))
                .returning(AttemptRow::as_returning())
                .get_result(conn)
                .await?;
            Ok(stored)
        }
        .scope_boxed()
    })
    .await
}

/// The completed attempt that won a race for `(quiz_id, student_id)`.
async fn completed_attempt_id(
    conn: &mut AsyncPgConnection,
    quiz_id: Uuid,
    student_id: Uuid,
) -> QueryResult<Option<Uuid>> {
    quiz_attempts::table
        .filter(quiz_attempts::quiz_id.eq(quiz_id))
        .filter(quiz_attempts::student_id.eq(student_id))
        .filter(quiz_attempts::is_completed.eq(true))
        .select(quiz_attempts::id)
        .first(conn)
        .await
        .optional()
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ActivityRepository for DieselActivityRepository {
    async fn find_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<Option<AssignmentSubmission>, ActivityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SubmissionRow> = assignment_submissions::table
            .find(*submission_id.as_uuid())
            .select(SubmissionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find submission"))?;
        row.map(row_to_submission)
            .transpose()
            .map_err(ActivityRepositoryError::query)
    }

    async fn save_submission(
        &self,
        submission: &AssignmentSubmission,
    ) -> Result<AssignmentSubmission, ActivityRepositoryError> {
        let row = submission_to_row(submission).map_err(ActivityRepositoryError::query)?;
        let graded = row.marks.is_some();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored = conn
            .transaction(|conn| {
                async move {
                    let insert = diesel::insert_into(assignment_submissions::table)
                        .values(&row)
                        .on_conflict((
                            assignment_submissions::assignment_id,
                            assignment_submissions::student_id,
                        ));
                    if graded {
                        insert
                            .do_update()
                            .set((
                                assignment_submissions::marks
                                    .eq(excluded(assignment_submissions::marks)),
                                assignment_submissions::feedback
                                    .eq(excluded(assignment_submissions::feedback)),
                                assignment_submissions::graded_at
                                    .eq(excluded(assignment_submissions::graded_at)),
                            ))
                            .execute(conn)
                            .await?;
                    } else {
                        insert.do_nothing().execute(conn).await?;
                    }
                    assignment_submissions::table
                        .filter(assignment_submissions::assignment_id.eq(row.assignment_id))
                        .filter(assignment_submissions::student_id.eq(row.student_id))
                        .select(SubmissionRow::as_select())
                        .first(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "save submission"))?;

        row_to_submission(stored).map_err(ActivityRepositoryError::query)
    }

    async fn count_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<u64, ActivityRepositoryError> {
        if assignment_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = assignment_submissions::table
            .filter(assignment_submissions::student_id.eq(*student_id.as_uuid()))
            .filter(assignment_submissions::assignment_id.eq_any(uuids(assignment_ids)))
            .filter(assignment_submissions::marks.is_not_null())
            .select(count_distinct(assignment_submissions::assignment_id))
            .first(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count graded submissions"))?;
        count_from_db(count, "graded submissions").map_err(ActivityRepositoryError::query)
    }

    async fn list_graded_submissions(
        &self,
        student_id: &StudentId,
        assignment_ids: &[AssignmentId],
    ) -> Result<Vec<AssignmentSubmission>, ActivityRepositoryError> {
        if assignment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SubmissionRow> = assignment_submissions::table
            .filter(assignment_submissions::student_id.eq(*student_id.as_uuid()))
            .filter(assignment_submissions::assignment_id.eq_any(uuids(assignment_ids)))
            .filter(assignment_submissions::marks.is_not_null())
            .order_by(assignment_submissions::graded_at)
            .select(SubmissionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "list graded submissions"))?;
        collect_rows(
            rows.into_iter().map(row_to_submission),
            ActivityRepositoryError::query,
        )
    }

    async fn insert_attempt(&self, attempt: &QuizAttempt) -> Result<(), ActivityRepositoryError> {
        let row = attempt_to_row(attempt).map_err(ActivityRepositoryError::query)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(quiz_attempts::table)
            .values(&row)
            .execute(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "insert attempt"))?;
        Ok(())
    }

    async fn find_attempt(
        &self,
        attempt_id: &AttemptId,
    ) -> Result<Option<QuizAttempt>, ActivityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<AttemptRow> = quiz_attempts::table
            .find(*attempt_id.as_uuid())
            .select(AttemptRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find attempt"))?;
        row.map(row_to_attempt)
            .transpose()
            .map_err(ActivityRepositoryError::query)
    }

    async fn list_attempts(
        &self,
        student_id: &StudentId,
        quiz_id: &QuizId,
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AttemptRow> = quiz_attempts::table
            .filter(quiz_attempts::student_id.eq(*student_id.as_uuid()))
            .filter(quiz_attempts::quiz_id.eq(*quiz_id.as_uuid()))
            .order_by((quiz_attempts::started_at, quiz_attempts::id))
            .select(AttemptRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "list attempts"))?;
        collect_rows(
            rows.into_iter().map(row_to_attempt),
            ActivityRepositoryError::query,
        )
    }

    async fn save_answers(&self, answers: &[QuizAnswer]) -> Result<(), ActivityRepositoryError> {
        if answers.is_empty() {
            return Ok(());
        }
        let rows: Vec<NewQuizAnswerRow> = answers.iter().map(answer_to_row).collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(quiz_answers::table)
            .values(&rows)
            .on_conflict((quiz_answers::attempt_id, quiz_answers::question_id))
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "save answers"))?;
        Ok(())
    }

    async fn record_completed_attempt(
        &self,
        attempt: &QuizAttempt,
    ) -> Result<QuizAttempt, ActivityRepositoryError> {
        if !attempt.is_completed {
            return Err(ActivityRepositoryError::query(format!(
                "attempt {} is not completed",
                attempt.id
            )));
        }
        let row = attempt_to_row(attempt).map_err(ActivityRepositoryError::query)?;
        let (quiz_id, student_id) = (row.quiz_id, row.student_id);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        match record_completed(&mut conn, row).await {
            Ok(stored) => row_to_attempt(stored).map_err(ActivityRepositoryError::query),
            Err(RecordAttemptError::CompletedElsewhere(other)) => Err(
                ActivityRepositoryError::attempt_already_completed(AttemptId::from(other)),
            ),
            Err(RecordAttemptError::Diesel(err)) if is_unique_violation(&err) => {
                debug!(attempt_id = %attempt.id, "concurrent completion lost the race");
                let winner = completed_attempt_id(&mut conn, quiz_id, student_id)
                    .await
                    .map_err(|err| map_query_error(err, "find completed attempt"))?;
                match winner {
                    Some(other) => Err(ActivityRepositoryError::attempt_already_completed(
                        AttemptId::from(other),
                    )),
                    None => Err(map_query_error(err, "record completed attempt")),
                }
            }
            Err(RecordAttemptError::Diesel(err)) => {
                Err(map_query_error(err, "record completed attempt"))
            }
        }
    }

    async fn count_completed_quizzes(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<u64, ActivityRepositoryError> {
        if quiz_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = quiz_attempts::table
            .filter(quiz_attempts::student_id.eq(*student_id.as_uuid()))
            .filter(quiz_attempts::quiz_id.eq_any(uuids(quiz_ids)))
            .filter(quiz_attempts::is_completed.eq(true))
            .select(count_distinct(quiz_attempts::quiz_id))
            .first(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count completed quizzes"))?;
        count_from_db(count, "completed quizzes").map_err(ActivityRepositoryError::query)
    }

    async fn list_completed_attempts(
        &self,
        student_id: &StudentId,
        quiz_ids: &[QuizId],
    ) -> Result<Vec<QuizAttempt>, ActivityRepositoryError> {
        if quiz_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<AttemptRow> = quiz_attempts::table
            .filter(quiz_attempts::student_id.eq(*student_id.as_uuid()))
            .filter(quiz_attempts::quiz_id.eq_any(uuids(quiz_ids)))
            .filter(quiz_attempts::is_completed.eq(true))
            .order_by(quiz_attempts::submitted_at)
            .select(AttemptRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "list completed attempts"))?;
        collect_rows(
            rows.into_iter().map(row_to_attempt),
            ActivityRepositoryError::query,
        )
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for row conversion and error mapping.
    use rstest::rstest;

    use super::*;
    use crate::domain::course::AnswerOption;
    use crate::domain::ids::QuestionId;
    use crate::test_support::fixture_time;

    fn submission(marks: Option<u32>) -> AssignmentSubmission {
        AssignmentSubmission {
            id: SubmissionId::random(),
            assignment_id: AssignmentId::random(),
            student_id: StudentId::random(),
            marks,
            feedback: marks.map(|_| "Well argued".to_owned()),
            submitted_at: fixture_time(),
            graded_at: marks.map(|_| fixture_time()),
        }
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0))]
    #[case(Some(95))]
    fn submission_marks_survive_conversion(#[case] marks: Option<u32>) {
        let original = submission(marks);
        let row = submission_to_row(&original).expect("marks fit");

        let restored = row_to_submission(SubmissionRow {
            id: row.id,
            assignment_id: row.assignment_id,
            student_id: row.student_id,
            marks: row.marks,
            feedback: row.feedback.map(str::to_owned),
            submitted_at: row.submitted_at,
            graded_at: row.graded_at,
        })
        .expect("valid row");

        assert_eq!(restored, original);
    }

    #[rstest]
    fn oversized_score_is_rejected() {
        let mut attempt = QuizAttempt::start(QuizId::random(), StudentId::random(), fixture_time());
        attempt.score = u32::MAX;

        assert!(attempt_to_row(&attempt).is_err());
    }

    #[rstest]
    fn answers_store_the_option_letter() {
        let answer = QuizAnswer {
            attempt_id: AttemptId::random(),
            question_id: QuestionId::random(),
            selected: AnswerOption::C,
            is_correct: false,
        };

        assert_eq!(answer_to_row(&answer).selected_option, "C");
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(err, ActivityRepositoryError::Connection { .. }));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let err = map_query_error(diesel::result::Error::NotFound, "find attempt");

        assert!(matches!(err, ActivityRepositoryError::Query { .. }));
        assert!(err.to_string().contains("find attempt"));
    }
}
