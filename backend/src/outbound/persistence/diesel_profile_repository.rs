//! PostgreSQL-backed profile rollups.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ids::{InstructorId, StudentId};
use crate::domain::ports::{ProfileRepository, ProfileRepositoryError};
use crate::domain::profiles::{InstructorProfile, StudentProfile};

use super::diesel_helpers::{count_from_db, count_to_db, map_diesel_error, map_pool_error_message};
use super::models::{InstructorProfileRow, StudentProfileRow};
use super::pool::{DbPool, PoolError};
use super::schema::{instructor_profiles, student_profiles};

/// Diesel-backed implementation of [`ProfileRepository`].
#[derive(Clone)]
pub struct DieselProfileRepository {
    pool: DbPool,
}

impl DieselProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> ProfileRepositoryError {
    ProfileRepositoryError::connection(map_pool_error_message(error))
}

fn map_query_error(error: diesel::result::Error, operation: &str) -> ProfileRepositoryError {
    map_diesel_error(
        error,
        operation,
        ProfileRepositoryError::query,
        ProfileRepositoryError::connection,
    )
}

fn student_to_row(profile: &StudentProfile) -> Result<StudentProfileRow, String> {
    Ok(StudentProfileRow {
        student_id: *profile.student_id.as_uuid(),
        courses_enrolled: count_to_db(profile.courses_enrolled, "courses_enrolled")?,
        courses_completed: count_to_db(profile.courses_completed, "courses_completed")?,
        modules_completed: count_to_db(profile.modules_completed, "modules_completed")?,
        badges_earned: count_to_db(profile.badges_earned, "badges_earned")?,
        updated_at: profile.updated_at,
    })
}

fn row_to_student(row: StudentProfileRow) -> Result<StudentProfile, String> {
    Ok(StudentProfile {
        student_id: row.student_id.into(),
        courses_enrolled: count_from_db(row.courses_enrolled, "courses_enrolled")?,
        courses_completed: count_from_db(row.courses_completed, "courses_completed")?,
        modules_completed: count_from_db(row.modules_completed, "modules_completed")?,
        badges_earned: count_from_db(row.badges_earned, "badges_earned")?,
        updated_at: row.updated_at,
    })
}

fn instructor_to_row(profile: &InstructorProfile) -> Result<InstructorProfileRow, String> {
    Ok(InstructorProfileRow {
        instructor_id: *profile.instructor_id.as_uuid(),
        courses_created: count_to_db(profile.courses_created, "courses_created")?,
        students: count_to_db(profile.students, "students")?,
        badges_awarded: count_to_db(profile.badges_awarded, "badges_awarded")?,
        updated_at: profile.updated_at,
    })
}

fn row_to_instructor(row: InstructorProfileRow) -> Result<InstructorProfile, String> {
    Ok(InstructorProfile {
        instructor_id: row.instructor_id.into(),
        courses_created: count_from_db(row.courses_created, "courses_created")?,
        students: count_from_db(row.students, "students")?,
        badges_awarded: count_from_db(row.badges_awarded, "badges_awarded")?,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl ProfileRepository for DieselProfileRepository {
    async fn save_student_profile(
        &self,
        profile: &StudentProfile,
    ) -> Result<(), ProfileRepositoryError> {
        let row = student_to_row(profile).map_err(ProfileRepositoryError::query)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(student_profiles::table)
            .values(&row)
            .on_conflict(student_profiles::student_id)
            .do_update()
            .set((
                student_profiles::courses_enrolled.eq(excluded(student_profiles::courses_enrolled)),
                student_profiles::courses_completed
                    .eq(excluded(student_profiles::courses_completed)),
                student_profiles::modules_completed
                    .eq(excluded(student_profiles::modules_completed)),
                student_profiles::badges_earned.eq(excluded(student_profiles::badges_earned)),
                student_profiles::updated_at.eq(excluded(student_profiles::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "save student profile"))?;
        Ok(())
    }

    async fn find_student_profile(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<StudentProfile>, ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<StudentProfileRow> = student_profiles::table
            .find(*student_id.as_uuid())
            .select(StudentProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find student profile"))?;
        row.map(row_to_student)
            .transpose()
            .map_err(ProfileRepositoryError::query)
    }

    async fn save_instructor_profile(
        &self,
        profile: &InstructorProfile,
    ) -> Result<(), ProfileRepositoryError> {
        let row = instructor_to_row(profile).map_err(ProfileRepositoryError::query)?;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::insert_into(instructor_profiles::table)
            .values(&row)
            .on_conflict(instructor_profiles::instructor_id)
            .do_update()
            .set((
                instructor_profiles::courses_created
                    .eq(excluded(instructor_profiles::courses_created)),
                instructor_profiles::students.eq(excluded(instructor_profiles::students)),
                instructor_profiles::badges_awarded
                    .eq(excluded(instructor_profiles::badges_awarded)),
                instructor_profiles::updated_at.eq(excluded(instructor_profiles::updated_at)),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "save instructor profile"))?;
        Ok(())
    }

    async fn find_instructor_profile(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Option<InstructorProfile>, ProfileRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<InstructorProfileRow> = instructor_profiles::table
            .find(*instructor_id.as_uuid())
            .select(InstructorProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find instructor profile"))?;
        row.map(row_to_instructor)
            .transpose()
            .map_err(ProfileRepositoryError::query)
    }
}
