//! Internal Diesel row structs.
//!
//! Rows never leave the persistence layer; adapters convert them to domain
//! types before returning.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    assignment_submissions, assignments, badges, course_modules, courses, enrollments,
    instructor_profiles, lesson_progress, lessons, module_progress, quiz_answers, quiz_attempts,
    quiz_questions, quizzes, student_badges, student_profiles,
};

// ---------------------------------------------------------------------------
// Course structure (read-only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CourseRow {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = course_modules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ModuleRow {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = lessons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LessonRow {
    pub id: Uuid,
    pub module_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = assignments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AssignmentRow {
    pub id: Uuid,
    pub title: String,
    pub max_marks: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = quizzes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct QuizRow {
    pub id: Uuid,
    pub title: String,
    pub max_marks: i32,
    pub pass_marks: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = quiz_questions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct QuestionRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub correct_option: String,
    pub marks: i32,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Enrollment row, used for both reads and inserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = enrollments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EnrollmentRow {
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub progress: f64,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = lesson_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LessonProgressRow {
    pub student_id: Uuid,
    pub lesson_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = module_progress)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ModuleProgressRow {
    pub student_id: Uuid,
    pub module_id: Uuid,
    pub completion_percentage: f64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = assignment_submissions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct SubmissionRow {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub marks: Option<i32>,
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = assignment_submissions)]
pub(crate) struct NewSubmissionRow<'a> {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub marks: Option<i32>,
    pub feedback: Option<&'a str>,
    pub submitted_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

/// Quiz attempt row, used for both reads and inserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = quiz_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AttemptRow {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub score: i32,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = quiz_answers)]
pub(crate) struct NewQuizAnswerRow {
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_option: &'static str,
    pub is_correct: bool,
}

// ---------------------------------------------------------------------------
// Badges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = badges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct BadgeRow {
    pub id: Uuid,
    pub badge_type: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = badges)]
pub(crate) struct NewBadgeRow<'a> {
    pub id: Uuid,
    pub badge_type: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub icon: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = student_badges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StudentBadgeRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub badge_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub awarded_at: DateTime<Utc>,
    pub awarded_by: Option<Uuid>,
    pub is_instructor_awarded: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = student_badges)]
pub(crate) struct NewStudentBadgeRow<'a> {
    pub id: Uuid,
    pub student_id: Uuid,
    pub badge_id: Uuid,
    pub course_id: Uuid,
    pub module_id: Option<Uuid>,
    pub awarded_at: DateTime<Utc>,
    pub awarded_by: Option<Uuid>,
    pub is_instructor_awarded: bool,
    pub note: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = student_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct StudentProfileRow {
    pub student_id: Uuid,
    pub courses_enrolled: i64,
    pub courses_completed: i64,
    pub modules_completed: i64,
    pub badges_earned: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = instructor_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct InstructorProfileRow {
    pub instructor_id: Uuid,
    pub courses_created: i64,
    pub students: i64,
    pub badges_awarded: i64,
    pub updated_at: DateTime<Utc>,
}
