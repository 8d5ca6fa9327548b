//! PostgreSQL-backed enrollment, lesson and module progress.
//!
//! Every insert-if-absent relies on a primary key plus
//! `ON CONFLICT DO NOTHING`, so concurrent callers converge on one row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_distinct;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::ids::{CourseId, LessonId, ModuleId, StudentId};
use crate::domain::ports::{EnrollmentInsert, ProgressRepository, ProgressRepositoryError};
use crate::domain::progress::{Enrollment, LessonProgress, ModuleProgress, ModuleProgressWrite};
use crate::domain::Percentage;

use super::diesel_helpers::{
    collect_rows, count_from_db, map_diesel_error, map_pool_error_message, percentage_from_db,
};
use super::models::{EnrollmentRow, LessonProgressRow, ModuleProgressRow};
use super::pool::{DbPool, PoolError};
use super::schema::{enrollments, lesson_progress, module_progress};

/// Diesel-backed implementation of [`ProgressRepository`].
#[derive(Clone)]
pub struct DieselProgressRepository {
    pool: DbPool,
}

impl DieselProgressRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ProgressRepositoryError {
    ProgressRepositoryError::connection(map_pool_error_message(error))
}

fn map_query_error(error: diesel::result::Error, operation: &str) -> ProgressRepositoryError {
    map_diesel_error(
        error,
        operation,
        ProgressRepositoryError::query,
        ProgressRepositoryError::connection,
    )
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().copied().map(Into::into).collect()
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

fn row_to_enrollment(row: EnrollmentRow) -> Result<Enrollment, String> {
    Ok(Enrollment {
        student_id: row.student_id.into(),
        course_id: row.course_id.into(),
        progress: percentage_from_db(row.progress, "enrollment progress")?,
        enrolled_at: row.enrolled_at,
    })
}

fn enrollment_to_row(enrollment: &Enrollment) -> EnrollmentRow {
    EnrollmentRow {
        student_id: *enrollment.student_id.as_uuid(),
        course_id: *enrollment.course_id.as_uuid(),
        progress: enrollment.progress.value(),
        enrolled_at: enrollment.enrolled_at,
    }
}

fn row_to_lesson_progress(row: LessonProgressRow) -> LessonProgress {
    LessonProgress {
        student_id: row.student_id.into(),
        lesson_id: row.lesson_id.into(),
        is_completed: row.is_completed,
        completed_at: row.completed_at,
    }
}

fn row_to_module_progress(row: ModuleProgressRow) -> Result<ModuleProgress, String> {
    Ok(ModuleProgress {
        student_id: row.student_id.into(),
        module_id: row.module_id.into(),
        completion_percentage: percentage_from_db(
            row.completion_percentage,
            "module completion_percentage",
        )?,
        is_completed: row.is_completed,
        completed_at: row.completed_at,
    })
}

fn module_progress_to_row(progress: &ModuleProgress) -> ModuleProgressRow {
    ModuleProgressRow {
        student_id: *progress.student_id.as_uuid(),
        module_id: *progress.module_id.as_uuid(),
        completion_percentage: progress.completion_percentage.value(),
        is_completed: progress.is_completed,
        completed_at: progress.completed_at,
    }
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProgressRepository for DieselProgressRepository {
    async fn insert_enrollment_if_absent(
        &self,
        enrollment: &Enrollment,
    ) -> Result<EnrollmentInsert, ProgressRepositoryError> {
        let row = enrollment_to_row(enrollment);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let (inserted, stored) = conn
            .transaction(|conn| {
                async move {
                    let inserted = diesel::insert_into(enrollments::table)
                        .values(&row)
                        .on_conflict((enrollments::student_id, enrollments::course_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    let stored: EnrollmentRow = enrollments::table
                        .find((row.student_id, row.course_id))
                        .select(EnrollmentRow::as_select())
                        .first(conn)
                        .await?;
                    Ok((inserted, stored))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "insert enrollment"))?;

        Ok(EnrollmentInsert {
            enrollment: row_to_enrollment(stored).map_err(ProgressRepositoryError::query)?,
            created: inserted == 1,
        })
    }

    async fn find_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, ProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<EnrollmentRow> = enrollments::table
            .find((*student_id.as_uuid(), *course_id.as_uuid()))
            .select(EnrollmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find enrollment"))?;
        row.map(row_to_enrollment)
            .transpose()
            .map_err(ProgressRepositoryError::query)
    }

    async fn update_enrollment_progress(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
        progress: Percentage,
    ) -> Result<Percentage, ProgressRepositoryError> {
        let key = (*student_id.as_uuid(), *course_id.as_uuid());
        let value = progress.value();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored: Option<f64> = conn
            .transaction(|conn| {
                async move {
                    diesel::update(
                        enrollments::table
                            .find(key)
                            .filter(enrollments::progress.lt(value)),
                    )
                    .set(enrollments::progress.eq(value))
                    .execute(conn)
                    .await?;
                    enrollments::table
                        .find(key)
                        .select(enrollments::progress)
                        .first(conn)
                        .await
                        .optional()
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "update enrollment progress"))?;

        let Some(stored) = stored else {
            return Err(ProgressRepositoryError::query(format!(
                "no enrollment for student {student_id} in course {course_id}"
            )));
        };
        percentage_from_db(stored, "enrollment progress").map_err(ProgressRepositoryError::query)
    }

    async fn list_enrollments_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<Enrollment>, ProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<EnrollmentRow> = enrollments::table
            .filter(enrollments::student_id.eq(*student_id.as_uuid()))
            .order_by(enrollments::enrolled_at)
            .select(EnrollmentRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "list enrollments"))?;
        collect_rows(
            rows.into_iter().map(row_to_enrollment),
            ProgressRepositoryError::query,
        )
    }

    async fn count_distinct_students(
        &self,
        course_ids: &[CourseId],
    ) -> Result<u64, ProgressRepositoryError> {
        if course_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = enrollments::table
            .filter(enrollments::course_id.eq_any(uuids(course_ids)))
            .select(count_distinct(enrollments::student_id))
            .first(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count students"))?;
        count_from_db(count, "students").map_err(ProgressRepositoryError::query)
    }

    async fn complete_lesson(
        &self,
        student_id: &StudentId,
        lesson_id: &LessonId,
        completed_at: DateTime<Utc>,
    ) -> Result<LessonProgress, ProgressRepositoryError> {
        let row = LessonProgressRow {
            student_id: *student_id.as_uuid(),
            lesson_id: *lesson_id.as_uuid(),
            is_completed: true,
            completed_at: Some(completed_at),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored = conn
            .transaction(|conn| {
                async move {
                    diesel::insert_into(lesson_progress::table)
                        .values(&row)
                        .on_conflict((lesson_progress::student_id, lesson_progress::lesson_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    // A pending row may predate this call; completed rows keep
                    // their first timestamp.
                    diesel::update(
                        lesson_progress::table
                            .find((row.student_id, row.lesson_id))
                            .filter(lesson_progress::is_completed.eq(false)),
                    )
                    .set((
                        lesson_progress::is_completed.eq(true),
                        lesson_progress::completed_at.eq(row.completed_at),
                    ))
                    .execute(conn)
                    .await?;
                    lesson_progress::table
                        .find((row.student_id, row.lesson_id))
                        .select(LessonProgressRow::as_select())
                        .first(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "complete lesson"))?;

        Ok(row_to_lesson_progress(stored))
    }

    async fn count_completed_lessons(
        &self,
        student_id: &StudentId,
        lesson_ids: &[LessonId],
    ) -> Result<u64, ProgressRepositoryError> {
        if lesson_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = lesson_progress::table
            .filter(lesson_progress::student_id.eq(*student_id.as_uuid()))
            .filter(lesson_progress::lesson_id.eq_any(uuids(lesson_ids)))
            .filter(lesson_progress::is_completed.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count completed lessons"))?;
        count_from_db(count, "completed lessons").map_err(ProgressRepositoryError::query)
    }

    async fn find_or_create_module_progress(
        &self,
        student_id: &StudentId,
        module_id: &ModuleId,
    ) -> Result<ModuleProgress, ProgressRepositoryError> {
        let pending = module_progress_to_row(&ModuleProgress::pending(*student_id, *module_id));
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let stored = conn
            .transaction(|conn| {
                async move {
                    diesel::insert_into(module_progress::table)
                        .values(&pending)
                        .on_conflict((module_progress::student_id, module_progress::module_id))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    module_progress::table
                        .find((pending.student_id, pending.module_id))
                        .select(ModuleProgressRow::as_select())
                        .first(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "find or create module progress"))?;

        row_to_module_progress(stored).map_err(ProgressRepositoryError::query)
    }

    async fn save_module_progress(
        &self,
        progress: &ModuleProgress,
    ) -> Result<ModuleProgressWrite, ProgressRepositoryError> {
        let incoming = progress.clone();
        let pending = module_progress_to_row(&ModuleProgress::pending(
            progress.student_id,
            progress.module_id,
        ));
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        conn.transaction(|conn| {
            async move {
                diesel::insert_into(module_progress::table)
                    .values(&pending)
                    .on_conflict((module_progress::student_id, module_progress::module_id))
                    .do_nothing()
                    .execute(conn)
                    .await?;
                let locked: ModuleProgressRow = module_progress::table
                    .find((pending.student_id, pending.module_id))
                    .select(ModuleProgressRow::as_select())
                    .for_update()
                    .first(conn)
                    .await?;
                let mut stored = row_to_module_progress(locked)
                    .map_err(|message| diesel::result::Error::DeserializationError(message.into()))?;

                let completed_now = stored.merge(&incoming);
                let merged = module_progress_to_row(&stored);
                diesel::update(module_progress::table.find((merged.student_id, merged.module_id)))
                    .set((
                        module_progress::completion_percentage.eq(merged.completion_percentage),
                        module_progress::is_completed.eq(merged.is_completed),
                        module_progress::completed_at.eq(merged.completed_at),
                    ))
                    .execute(conn)
                    .await?;
                Ok::<_, diesel::result::Error>(ModuleProgressWrite {
                    stored,
                    completed_now,
                })
            }
            .scope_boxed()
        })
        .await
        .map_err(|err| map_query_error(err, "save module progress"))
    }

    async fn count_completed_modules(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, ProgressRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = module_progress::table
            .filter(module_progress::student_id.eq(*student_id.as_uuid()))
            .filter(module_progress::is_completed.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count completed modules"))?;
        count_from_db(count, "completed modules").map_err(ProgressRepositoryError::query)
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for row conversion and error mapping.
    use rstest::rstest;

    use super::*;
    use crate::test_support::fixture_time;

    #[rstest]
    fn enrollment_rows_round_trip_through_the_domain() {
        let enrollment = Enrollment::new(StudentId::random(), CourseId::random(), fixture_time());

        let restored = row_to_enrollment(enrollment_to_row(&enrollment)).expect("valid row");

        assert_eq!(restored, enrollment);
    }

    #[rstest]
    fn out_of_range_progress_is_a_query_error() {
        let mut row = enrollment_to_row(&Enrollment::new(
            StudentId::random(),
            CourseId::random(),
            fixture_time(),
        ));
        row.progress = 140.0;

        let err = row_to_enrollment(row).expect_err("progress out of range");

        assert!(err.contains("enrollment progress"));
    }

    #[rstest]
    fn completed_module_row_keeps_its_timestamp() {
        let mut progress = ModuleProgress::pending(StudentId::random(), ModuleId::random());
        progress.apply(3, 3, fixture_time());

        let restored =
            row_to_module_progress(module_progress_to_row(&progress)).expect("valid row");

        assert!(restored.is_completed);
        assert_eq!(restored.completed_at, Some(fixture_time()));
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::checkout("connection refused"));

        assert!(matches!(err, ProgressRepositoryError::Connection { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    fn diesel_error_maps_to_query_error() {
        let err = map_query_error(diesel::result::Error::NotFound, "find enrollment");

        assert!(matches!(err, ProgressRepositoryError::Query { .. }));
    }
}
