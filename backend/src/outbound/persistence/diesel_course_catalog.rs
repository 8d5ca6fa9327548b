//! PostgreSQL-backed course catalog.
//!
//! Courses are authored outside this service; the adapter only assembles
//! [`CourseOutline`] values from the structure tables.

use std::collections::HashMap;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::course::{
    AnswerOption, AssignmentOutline, CourseItem, CourseOutline, ModuleOutline, QuestionOutline,
    QuizOutline,
};
use crate::domain::ids::{CourseId, InstructorId};
use crate::domain::ports::{CourseCatalog, CourseCatalogError};

use super::diesel_helpers::{int_from_db, map_diesel_error, map_pool_error_message};
use super::models::{AssignmentRow, CourseRow, LessonRow, ModuleRow, QuestionRow, QuizRow};
use super::pool::{DbPool, PoolError};
use super::schema::{assignments, course_modules, courses, lessons, quiz_questions, quizzes};

/// Diesel-backed implementation of [`CourseCatalog`].
#[derive(Clone)]
pub struct DieselCourseCatalog {
    pool: DbPool,
}

impl DieselCourseCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> CourseCatalogError {
    CourseCatalogError::connection(map_pool_error_message(error))
}

fn map_query_error(error: diesel::result::Error, operation: &str) -> CourseCatalogError {
    map_diesel_error(
        error,
        operation,
        CourseCatalogError::query,
        CourseCatalogError::connection,
    )
}

/// Every row that makes up one course outline.
struct OutlineRows {
    course: CourseRow,
    modules: Vec<ModuleRow>,
    lessons: Vec<LessonRow>,
    assignments: Vec<AssignmentRow>,
    quizzes: Vec<QuizRow>,
    questions: Vec<QuestionRow>,
}

/// Load the outline rows inside one read transaction so the structure is
/// read from a single snapshot.
async fn load_outline_rows(
    conn: &mut AsyncPgConnection,
    course_id: Uuid,
) -> QueryResult<Option<OutlineRows>> {
    conn.transaction(|conn| {
        async move {
            let Some(course) = courses::table
                .find(course_id)
                .select(CourseRow::as_select())
                .first(conn)
                .await
                .optional()?
            else {
                return Ok(None);
            };

            let modules: Vec<ModuleRow> = course_modules::table
                .filter(course_modules::course_id.eq(course_id))
                .order_by((course_modules::position, course_modules::id))
                .select(ModuleRow::as_select())
                .load(conn)
                .await?;
            let module_ids: Vec<Uuid> = modules.iter().map(|module| module.id).collect();
            let lessons: Vec<LessonRow> = lessons::table
                .filter(lessons::module_id.eq_any(module_ids))
                .order_by((lessons::position, lessons::id))
                .select(LessonRow::as_select())
                .load(conn)
                .await?;

            let assignments: Vec<AssignmentRow> = assignments::table
                .filter(assignments::course_id.eq(course_id))
                .order_by((assignments::position, assignments::id))
                .select(AssignmentRow::as_select())
                .load(conn)
                .await?;

            let quizzes: Vec<QuizRow> = quizzes::table
                .filter(quizzes::course_id.eq(course_id))
                .order_by((quizzes::position, quizzes::id))
                .select(QuizRow::as_select())
                .load(conn)
                .await?;
            let quiz_ids: Vec<Uuid> = quizzes.iter().map(|quiz| quiz.id).collect();
            let questions: Vec<QuestionRow> = quiz_questions::table
                .filter(quiz_questions::quiz_id.eq_any(quiz_ids))
                .order_by((quiz_questions::position, quiz_questions::id))
                .select(QuestionRow::as_select())
                .load(conn)
                .await?;

            Ok(Some(OutlineRows {
                course,
                modules,
                lessons,
                assignments,
                quizzes,
                questions,
            }))
        }
        .scope_boxed()
    })
    .await
}

/// Resolve the course that owns `item`.
async fn owning_course_id(
    conn: &mut AsyncPgConnection,
    item: CourseItem,
) -> QueryResult<Option<Uuid>> {
    match item {
        CourseItem::Module(module_id) => {
            course_modules::table
                .find(*module_id.as_uuid())
                .select(course_modules::course_id)
                .first(conn)
                .await
                .optional()
        }
        CourseItem::Lesson(lesson_id) => {
            lessons::table
                .inner_join(course_modules::table)
                .filter(lessons::id.eq(*lesson_id.as_uuid()))
                .select(course_modules::course_id)
                .first(conn)
                .await
                .optional()
        }
        CourseItem::Assignment(assignment_id) => {
            assignments::table
                .find(*assignment_id.as_uuid())
                .select(assignments::course_id)
                .first(conn)
                .await
                .optional()
        }
        CourseItem::Quiz(quiz_id) => {
            quizzes::table
                .find(*quiz_id.as_uuid())
                .select(quizzes::course_id)
                .first(conn)
                .await
                .optional()
        }
    }
}

fn row_to_question(row: QuestionRow) -> Result<QuestionOutline, String> {
    let correct_option = row
        .correct_option
        .parse::<AnswerOption>()
        .map_err(|err| err.to_string())?;
    Ok(QuestionOutline {
        id: row.id.into(),
        correct_option,
        marks: int_from_db(row.marks, "question marks")?,
    })
}

fn assemble_outline(rows: OutlineRows) -> Result<CourseOutline, String> {
    let OutlineRows {
        course,
        modules,
        lessons,
        assignments,
        quizzes,
        questions,
    } = rows;

    let mut lessons_by_module: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for lesson in lessons {
        lessons_by_module
            .entry(lesson.module_id)
            .or_default()
            .push(lesson.id);
    }
    let mut questions_by_quiz: HashMap<Uuid, Vec<QuestionOutline>> = HashMap::new();
    for row in questions {
        let quiz_id = row.quiz_id;
        questions_by_quiz
            .entry(quiz_id)
            .or_default()
            .push(row_to_question(row)?);
    }

    let modules = modules
        .into_iter()
        .map(|module| ModuleOutline {
            lesson_ids: lessons_by_module
                .remove(&module.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            id: module.id.into(),
            title: module.title,
        })
        .collect();

    let assignments = assignments
        .into_iter()
        .map(|row| {
            Ok(AssignmentOutline {
                id: row.id.into(),
                title: row.title,
                max_marks: int_from_db(row.max_marks, "assignment max_marks")?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let quizzes = quizzes
        .into_iter()
        .map(|row| {
            Ok(QuizOutline {
                questions: questions_by_quiz.remove(&row.id).unwrap_or_default(),
                id: row.id.into(),
                title: row.title,
                max_marks: int_from_db(row.max_marks, "quiz max_marks")?,
                pass_marks: int_from_db(row.pass_marks, "quiz pass_marks")?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(CourseOutline {
        id: course.id.into(),
        instructor_id: course.instructor_id.into(),
        title: course.title,
        modules,
        assignments,
        quizzes,
    })
}

impl DieselCourseCatalog {
    async fn outline(
        &self,
        conn: &mut AsyncPgConnection,
        course_id: Uuid,
    ) -> Result<Option<CourseOutline>, CourseCatalogError> {
        let rows = load_outline_rows(conn, course_id)
            .await
            .map_err(|err| map_query_error(err, "course outline"))?;
        rows.map(assemble_outline)
            .transpose()
            .map_err(CourseCatalogError::query)
    }
}

#[async_trait]
impl CourseCatalog for DieselCourseCatalog {
    async fn find_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Option<CourseOutline>, CourseCatalogError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        self.outline(&mut conn, *course_id.as_uuid()).await
    }

    async fn find_course_containing(
        &self,
        item: CourseItem,
    ) -> Result<Option<CourseOutline>, CourseCatalogError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let course_id = owning_course_id(&mut conn, item)
            .await
            .map_err(|err| map_query_error(err, "course item owner"))?;
        match course_id {
            Some(course_id) => self.outline(&mut conn, course_id).await,
            None => Ok(None),
        }
    }

    async fn list_courses_for_instructor(
        &self,
        instructor_id: &InstructorId,
    ) -> Result<Vec<CourseId>, CourseCatalogError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let ids: Vec<Uuid> = courses::table
            .filter(courses::instructor_id.eq(*instructor_id.as_uuid()))
            .order_by(courses::created_at)
            .select(courses::id)
            .load(&mut conn)
            .await
            .map_err(|err| map_query_error(err, "instructor courses"))?;
        Ok(ids.into_iter().map(CourseId::from).collect())
    }
}
