//! PostgreSQL-backed badge catalog and awards.
//!
//! Catalog entries are unique on `(badge_type, name)`. Awards are unique
//! per student, badge and scope through two partial indexes, one for
//! course-scoped and one for module-scoped awards.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::badges::{
    AwardOutcome, Badge, BadgeDefinition, BadgeScope, BadgeType, NewStudentBadge, StudentBadge,
};
use crate::domain::ids::{BadgeId, InstructorId, ModuleId, StudentId};
use crate::domain::ports::{BadgeRepository, BadgeRepositoryError, CatalogEntry};

use super::diesel_helpers::{collect_rows, count_from_db, map_diesel_error, map_pool_error_message};
use super::models::{BadgeRow, NewBadgeRow, NewStudentBadgeRow, StudentBadgeRow};
use super::pool::{DbPool, PoolError};
use super::schema::{badges, student_badges};

/// Diesel-backed implementation of [`BadgeRepository`].
#[derive(Clone)]
pub struct DieselBadgeRepository {
    pool: DbPool,
}

impl DieselBadgeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> BadgeRepositoryError {
    BadgeRepositoryError::connection(map_pool_error_message(error))
}

fn map_query_error(error: diesel::result::Error, operation: &str) -> BadgeRepositoryError {
    map_diesel_error(
        error,
        operation,
        BadgeRepositoryError::query,
        BadgeRepositoryError::connection,
    )
}

// ---------------------------------------------------------------------------
// Row converters
// ---------------------------------------------------------------------------

fn row_to_badge(row: BadgeRow) -> Result<Badge, String> {
    let badge_type = row
        .badge_type
        .parse::<BadgeType>()
        .map_err(|err| err.to_string())?;
    Ok(Badge {
        id: row.id.into(),
        badge_type,
        name: row.name,
        description: row.description,
        icon: row.icon,
    })
}

fn row_to_award(row: StudentBadgeRow) -> Result<StudentBadge, String> {
    let course_id = row.course_id.into();
    let scope = match row.module_id {
        Some(module_id) => BadgeScope::Module {
            course_id,
            module_id: ModuleId::from(module_id),
        },
        None => BadgeScope::Course { course_id },
    };
    if row.is_instructor_awarded != row.awarded_by.is_some() {
        return Err(format!(
            "award {} has inconsistent instructor attribution",
            row.id
        ));
    }
    Ok(StudentBadge {
        id: row.id.into(),
        student_id: row.student_id.into(),
        badge_id: row.badge_id.into(),
        scope,
        awarded_at: row.awarded_at,
        awarded_by: row.awarded_by.map(InstructorId::from),
        is_instructor_awarded: row.is_instructor_awarded,
        note: row.note,
    })
}

fn award_to_row(award: &StudentBadge) -> NewStudentBadgeRow<'_> {
    NewStudentBadgeRow {
        id: *award.id.as_uuid(),
        student_id: *award.student_id.as_uuid(),
        badge_id: *award.badge_id.as_uuid(),
        course_id: *award.scope.course_id().as_uuid(),
        module_id: award.scope.module_id().map(Uuid::from),
        awarded_at: award.awarded_at,
        awarded_by: award.awarded_by.map(Uuid::from),
        is_instructor_awarded: award.is_instructor_awarded,
        note: award.note.as_deref(),
    }
}

// ---------------------------------------------------------------------------
// Trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl BadgeRepository for DieselBadgeRepository {
    async fn find_or_seed(
        &self,
        definition: &BadgeDefinition,
    ) -> Result<CatalogEntry, BadgeRepositoryError> {
        let row = NewBadgeRow {
            id: Uuid::new_v4(),
            badge_type: definition.badge_type.as_str(),
            name: definition.name,
            description: definition.description,
            icon: definition.icon,
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let (inserted, stored) = conn
            .transaction(|conn| {
                async move {
                    let inserted = diesel::insert_into(badges::table)
                        .values(&row)
                        .on_conflict((badges::badge_type, badges::name))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    let stored: BadgeRow = badges::table
                        .filter(badges::badge_type.eq(row.badge_type))
                        .filter(badges::name.eq(row.name))
                        .select(BadgeRow::as_select())
                        .first(conn)
                        .await?;
                    Ok((inserted, stored))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "seed badge"))?;

        Ok(CatalogEntry {
            badge: row_to_badge(stored).map_err(BadgeRepositoryError::query)?,
            created: inserted == 1,
        })
    }

    async fn find_badge(&self, badge_id: &BadgeId) -> Result<Option<Badge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<BadgeRow> = badges::table
            .find(*badge_id.as_uuid())
            .select(BadgeRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_query_error(err, "find badge"))?;
        row.map(row_to_badge)
            .transpose()
            .map_err(BadgeRepositoryError::query)
    }

    async fn insert_award_if_absent(
        &self,
        award: &NewStudentBadge,
    ) -> Result<AwardOutcome, BadgeRepositoryError> {
        let candidate = StudentBadge::from(award.clone());
        let row = award_to_row(&candidate);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let (inserted, stored) = conn
            .transaction(|conn| {
                async move {
                    // Either partial index may fire, so no conflict target.
                    let inserted = diesel::insert_into(student_badges::table)
                        .values(&row)
                        .on_conflict_do_nothing()
                        .execute(conn)
                        .await?;
                    let same_badge = student_badges::table
                        .filter(student_badges::student_id.eq(row.student_id))
                        .filter(student_badges::badge_id.eq(row.badge_id))
                        .filter(student_badges::course_id.eq(row.course_id));
                    let stored: StudentBadgeRow = match row.module_id {
                        Some(module_id) => {
                            same_badge
                                .filter(student_badges::module_id.eq(module_id))
                                .select(StudentBadgeRow::as_select())
                                .first(conn)
                                .await?
                        }
                        None => {
                            same_badge
                                .filter(student_badges::module_id.is_null())
                                .select(StudentBadgeRow::as_select())
                                .first(conn)
                                .await?
                        }
                    };
                    Ok((inserted, stored))
                }
                .scope_boxed()
            })
            .await
            .map_err(|err| map_query_error(err, "insert award"))?;

        let stored = row_to_award(stored).map_err(BadgeRepositoryError::query)?;
        Ok(if inserted == 1 {
            AwardOutcome::Granted(stored)
        } else {
            AwardOutcome::AlreadyHeld(stored)
        })
    }

    async fn list_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<Vec<StudentBadge>, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<StudentBadgeRow> = student_badges::table
            .filter(student_badges::student_id.eq(*student_id.as_uuid()))
            .order_by((student_badges::awarded_at, student_badges::id))
            .select(StudentBadgeRow::as_select())
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "list awards"))?;
        collect_rows(rows.into_iter().map(row_to_award), BadgeRepositoryError::query)
    }

    async fn count_awards_for_student(
        &self,
        student_id: &StudentId,
    ) -> Result<u64, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = student_badges::table
            .filter(student_badges::student_id.eq(*student_id.as_uuid()))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count student awards"))?;
        count_from_db(count, "student awards").map_err(BadgeRepositoryError::query)
    }

    async fn count_awards_by_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<u64, BadgeRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let count: i64 = student_badges::table
            .filter(student_badges::awarded_by.eq(*instructor_id.as_uuid()))
            .filter(student_badges::is_instructor_awarded.eq(true))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "count instructor awards"))?;
        count_from_db(count, "instructor awards").map_err(BadgeRepositoryError::query)
    }
}

#[cfg(test)]
mod tests {
    //! Coverage for row conversion and error mapping.
    use rstest::rstest;

    use super::*;
    use crate::domain::badges::AwardOrigin;
    use crate::domain::ids::{AwardId, CourseId};
    use crate::test_support::fixture_time;

    fn stored_row(award: &StudentBadge) -> StudentBadgeRow {
        let row = award_to_row(award);
        StudentBadgeRow {
            id: row.id,
            student_id: row.student_id,
            badge_id: row.badge_id,
            course_id: row.course_id,
            module_id: row.module_id,
            awarded_at: row.awarded_at,
            awarded_by: row.awarded_by,
            is_instructor_awarded: row.is_instructor_awarded,
            note: row.note.map(str::to_owned),
        }
    }

    fn award(scope: BadgeScope, origin: AwardOrigin) -> StudentBadge {
        StudentBadge::from(NewStudentBadge {
            id: AwardId::random(),
            student_id: StudentId::random(),
            badge_id: BadgeId::random(),
            scope,
            awarded_at: fixture_time(),
            origin,
        })
    }

    #[rstest]
    fn module_scope_survives_storage() {
        let scope = BadgeScope::Module {
            course_id: CourseId::random(),
            module_id: ModuleId::random(),
        };
        let original = award(scope, AwardOrigin::Automatic);

        let restored = row_to_award(stored_row(&original)).expect("valid row");

        assert_eq!(restored, original);
    }

    #[rstest]
    fn instructor_attribution_survives_storage() {
        let original = award(
            BadgeScope::Course {
                course_id: CourseId::random(),
            },
            AwardOrigin::Instructor {
                instructor_id: InstructorId::random(),
                note: Some("Led the study group".to_owned()),
            },
        );

        let restored = row_to_award(stored_row(&original)).expect("valid row");

        assert_eq!(restored, original);
    }

    #[rstest]
    fn inconsistent_attribution_is_rejected() {
        let original = award(
            BadgeScope::Course {
                course_id: CourseId::random(),
            },
            AwardOrigin::Automatic,
        );
        let mut row = stored_row(&original);
        row.is_instructor_awarded = true;

        assert!(row_to_award(row).is_err());
    }

    #[rstest]
    fn unknown_badge_type_is_rejected() {
        let row = BadgeRow {
            id: Uuid::new_v4(),
            badge_type: "gold_star".to_owned(),
            name: "Gold Star".to_owned(),
            description: String::new(),
            icon: "⭐".to_owned(),
        };

        assert!(row_to_badge(row).is_err());
    }

    #[rstest]
    fn pool_error_maps_to_connection_error() {
        let err = map_pool_error(PoolError::build("bad url"));

        assert!(matches!(err, BadgeRepositoryError::Connection { .. }));
    }
}
