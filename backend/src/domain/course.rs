//! Read model of a course's structure.
//!
//! Courses are authored elsewhere; the engine only reads the outline to know
//! which items count towards progress. Nothing here is ever mutated by the
//! progress pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ids::{AssignmentId, CourseId, InstructorId, LessonId, ModuleId, QuestionId, QuizId};

/// A multiple-choice option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    /// All options in display order.
    pub const ALL: [AnswerOption; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Single-letter storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl fmt::Display for AnswerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown answer option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid answer option '{input}': expected one of A, B, C, D")]
pub struct ParseAnswerOptionError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for AnswerOption {
    type Err = ParseAnswerOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|option| option.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| ParseAnswerOptionError {
                input: s.to_owned(),
            })
    }
}

/// A module and its ordered lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutline {
    pub id: ModuleId,
    pub title: String,
    pub lesson_ids: Vec<LessonId>,
}

/// A gradable assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutline {
    pub id: AssignmentId,
    pub title: String,
    pub max_marks: u32,
}

/// A quiz question with its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutline {
    pub id: QuestionId,
    pub correct_option: AnswerOption,
    pub marks: u32,
}

/// A quiz and its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutline {
    pub id: QuizId,
    pub title: String,
    pub max_marks: u32,
    pub pass_marks: u32,
    pub questions: Vec<QuestionOutline>,
}

impl QuizOutline {
    /// Whether `score` meets the pass mark.
    pub fn is_passing(&self, score: u32) -> bool {
        score >= self.pass_marks
    }
}

/// The structure of a course as seen by the progress engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutline {
    pub id: CourseId,
    pub instructor_id: InstructorId,
    pub title: String,
    pub modules: Vec<ModuleOutline>,
    pub assignments: Vec<AssignmentOutline>,
    pub quizzes: Vec<QuizOutline>,
}

impl CourseOutline {
    /// Every lesson in every module, in module order.
    pub fn lesson_ids(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.modules
            .iter()
            .flat_map(|module| module.lesson_ids.iter().copied())
    }

    /// Number of items that count towards course progress.
    pub fn total_items(&self) -> u64 {
        let lessons = self.lesson_ids().count();
        (lessons + self.assignments.len() + self.quizzes.len()) as u64
    }

    /// Find a module by id.
    pub fn module(&self, module_id: ModuleId) -> Option<&ModuleOutline> {
        self.modules.iter().find(|module| module.id == module_id)
    }

    /// Find the module that owns `lesson_id`.
    pub fn module_for_lesson(&self, lesson_id: LessonId) -> Option<&ModuleOutline> {
        self.modules
            .iter()
            .find(|module| module.lesson_ids.contains(&lesson_id))
    }

    /// Find an assignment by id.
    pub fn assignment(&self, assignment_id: AssignmentId) -> Option<&AssignmentOutline> {
        self.assignments
            .iter()
            .find(|assignment| assignment.id == assignment_id)
    }

    /// Find a quiz by id.
    pub fn quiz(&self, quiz_id: QuizId) -> Option<&QuizOutline> {
        self.quizzes.iter().find(|quiz| quiz.id == quiz_id)
    }

    /// Whether the course contains `item`.
    pub fn contains(&self, item: CourseItem) -> bool {
        match item {
            CourseItem::Module(id) => self.module(id).is_some(),
            CourseItem::Lesson(id) => self.module_for_lesson(id).is_some(),
            CourseItem::Assignment(id) => self.assignment(id).is_some(),
            CourseItem::Quiz(id) => self.quiz(id).is_some(),
        }
    }
}

/// A reference to something inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CourseItem {
    Module(ModuleId),
    Lesson(LessonId),
    Assignment(AssignmentId),
    Quiz(QuizId),
}

impl fmt::Display for CourseItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(id) => write!(f, "module {id}"),
            Self::Lesson(id) => write!(f, "lesson {id}"),
            Self::Assignment(id) => write!(f, "assignment {id}"),
            Self::Quiz(id) => write!(f, "quiz {id}"),
        }
    }
}
