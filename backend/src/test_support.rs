//! Test utilities for the backend crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and behind the `test-support` feature.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

use crate::domain::course::{
    AnswerOption, AssignmentOutline, CourseOutline, ModuleOutline, QuestionOutline, QuizOutline,
};
use crate::domain::ids::{
    AssignmentId, CourseId, InstructorId, LessonId, ModuleId, QuestionId, QuizId,
};

/// Fixed instant used as the default "now" in tests.
pub fn fixture_time() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).single() {
        Some(now) => now,
        None => panic!("fixture timestamp is valid"),
    }
}

/// A clock tests can move forward by hand.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance_seconds(&self, seconds: i64) {
        *self.lock_clock() += TimeDelta::seconds(seconds);
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Default for MutableClock {
    fn default() -> Self {
        Self::new(fixture_time())
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}

/// Builds course outlines with generated ids.
///
/// Every quiz question's correct answer is [`AnswerOption::A`].
///
/// # Examples
///
/// ```
/// use lms_backend::domain::InstructorId;
/// use lms_backend::test_support::CourseBuilder;
///
/// let course = CourseBuilder::new(InstructorId::random())
///     .module(2)
///     .assignment(100)
///     .quiz(&[50, 50])
///     .build();
/// assert_eq!(course.total_items(), 4);
/// ```
pub struct CourseBuilder {
    outline: CourseOutline,
}

impl CourseBuilder {
    pub fn new(instructor_id: InstructorId) -> Self {
        Self {
            outline: CourseOutline {
                id: CourseId::random(),
                instructor_id,
                title: "Fixture course".to_owned(),
                modules: Vec::new(),
                assignments: Vec::new(),
                quizzes: Vec::new(),
            },
        }
    }

    /// Append a module with `lessons` lessons.
    pub fn module(mut self, lessons: usize) -> Self {
        let index = self.outline.modules.len() + 1;
        self.outline.modules.push(ModuleOutline {
            id: ModuleId::random(),
            title: format!("Module {index}"),
            lesson_ids: (0..lessons).map(|_| LessonId::random()).collect(),
        });
        self
    }

    /// Append an assignment marked out of `max_marks`.
    pub fn assignment(mut self, max_marks: u32) -> Self {
        let index = self.outline.assignments.len() + 1;
        self.outline.assignments.push(AssignmentOutline {
            id: AssignmentId::random(),
            title: format!("Assignment {index}"),
            max_marks,
        });
        self
    }

    /// Append a quiz with one question per entry in `question_marks`.
    pub fn quiz(mut self, question_marks: &[u32]) -> Self {
        let index = self.outline.quizzes.len() + 1;
        let max_marks = question_marks.iter().sum::<u32>();
        self.outline.quizzes.push(QuizOutline {
            id: QuizId::random(),
            title: format!("Quiz {index}"),
            max_marks,
            pass_marks: max_marks / 2,
            questions: question_marks
                .iter()
                .map(|&marks| QuestionOutline {
                    id: QuestionId::random(),
                    correct_option: AnswerOption::A,
                    marks,
                })
                .collect(),
        });
        self
    }

    pub fn build(self) -> CourseOutline {
        self.outline
    }
}
