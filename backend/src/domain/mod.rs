//! Domain primitives, services and ports.
//!
//! Purpose: model student progress through courses and the badges it
//! earns. Services here depend only on the traits in [`ports`]; adapters
//! live under `crate::outbound`.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - ProgressDispatcher: ordered pipeline run after each student action.
//! - CompletionEvaluator: module and course percentage recomputation.
//! - BadgeEngine: rule-driven and manual badge awards.
//! - ProfileAggregator: student and instructor rollups.

pub mod activity;
pub mod badges;
pub mod completion;
pub mod course;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod percentage;
pub mod ports;
mod preconditions;
pub mod profiles;
pub mod progress;

pub use self::activity::{AnswerSubmission, AssignmentSubmission, QuizAnswer, QuizAttempt};
pub use self::badges::{BadgeEngine, InstructorAward};
pub use self::completion::{Cascade, CompletionEvaluator, ModuleBadgeRule, ModuleCompletion};
pub use self::course::{AnswerOption, CourseItem, CourseOutline};
pub use self::dispatcher::{
    ActivityOutcome, EnrollOutcome, LessonOutcome, ProgressDispatcher, QuizAttemptStart,
    SweepReport,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{
    AssignmentId, AttemptId, AwardId, BadgeId, CourseId, IdParseError, InstructorId, LessonId,
    ModuleId, QuestionId, QuizId, StudentId, SubmissionId,
};
pub use self::percentage::{Percentage, PercentageError};
pub use self::profiles::{InstructorProfile, ProfileAggregator, StudentProfile};
pub use self::progress::{Enrollment, LessonProgress, ModuleProgress, ModuleProgressWrite};

