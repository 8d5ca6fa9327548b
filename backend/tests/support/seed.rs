//! Insert course structure rows for Diesel-backed suites.
//!
//! The engine never writes course content, so suites seed it directly with
//! the `postgres` client.

use lms_backend::domain::course::CourseOutline;
use postgres::{Client, NoTls, Transaction};

use super::format_postgres_error;

fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

fn marks(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn insert_modules(tx: &mut Transaction<'_>, course: &CourseOutline) -> Result<(), postgres::Error> {
    let course_id = *course.id.as_uuid();
    for (index, module) in course.modules.iter().enumerate() {
        tx.execute(
            "INSERT INTO course_modules (id, course_id, title, position) VALUES ($1, $2, $3, $4)",
            &[module.id.as_uuid(), &course_id, &module.title, &position(index)],
        )?;
        for (lesson_index, lesson_id) in module.lesson_ids.iter().enumerate() {
            tx.execute(
                "INSERT INTO lessons (id, module_id, position) VALUES ($1, $2, $3)",
                &[lesson_id.as_uuid(), module.id.as_uuid(), &position(lesson_index)],
            )?;
        }
    }
    Ok(())
}

fn insert_activities(
    tx: &mut Transaction<'_>,
    course: &CourseOutline,
) -> Result<(), postgres::Error> {
    let course_id = *course.id.as_uuid();
    for (index, assignment) in course.assignments.iter().enumerate() {
        tx.execute(
            "INSERT INTO assignments (id, course_id, title, max_marks, position) \
             VALUES ($1, $2, $3, $4, $5)",
            &[
                assignment.id.as_uuid(),
                &course_id,
                &assignment.title,
                &marks(assignment.max_marks),
                &position(index),
            ],
        )?;
    }
    for (index, quiz) in course.quizzes.iter().enumerate() {
        tx.execute(
            "INSERT INTO quizzes (id, course_id, title, max_marks, pass_marks, position) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                quiz.id.as_uuid(),
                &course_id,
                &quiz.title,
                &marks(quiz.max_marks),
                &marks(quiz.pass_marks),
                &position(index),
            ],
        )?;
        for (question_index, question) in quiz.questions.iter().enumerate() {
            tx.execute(
                "INSERT INTO quiz_questions (id, quiz_id, correct_option, marks, position) \
                 VALUES ($1, $2, $3, $4, $5)",
                &[
                    question.id.as_uuid(),
                    quiz.id.as_uuid(),
                    &question.correct_option.as_str(),
                    &marks(question.marks),
                    &position(question_index),
                ],
            )?;
        }
    }
    Ok(())
}

/// Store a course outline and everything inside it in one transaction.
pub fn seed_course(database_url: &str, course: &CourseOutline) -> Result<(), String> {
    let mut client =
        Client::connect(database_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    let mut tx = client
        .transaction()
        .map_err(|err| format_postgres_error(&err))?;
    tx.execute(
        "INSERT INTO courses (id, instructor_id, title) VALUES ($1, $2, $3)",
        &[course.id.as_uuid(), course.instructor_id.as_uuid(), &course.title],
    )
    .map_err(|err| format_postgres_error(&err))?;
    insert_modules(&mut tx, course).map_err(|err| format_postgres_error(&err))?;
    insert_activities(&mut tx, course).map_err(|err| format_postgres_error(&err))?;
    tx.commit().map_err(|err| format_postgres_error(&err))
}

/// Count rows matching a single-parameter query.
pub fn count_rows(database_url: &str, sql: &str, id: &uuid::Uuid) -> Result<i64, String> {
    let mut client =
        Client::connect(database_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    let row = client
        .query_one(sql, &[id])
        .map_err(|err| format_postgres_error(&err))?;
    Ok(row.get(0))
}
