//! Strongly typed identifiers for every record the engine touches.
//!
//! Each identifier wraps a UUID so a lesson id can never be handed to a port
//! expecting a quiz id. Students and instructors are both users of the wider
//! system; they get distinct types because the engine treats the roles
//! differently.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned when an identifier string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} identifier '{input}'")]
pub struct IdParseError {
    /// Identifier kind being parsed, e.g. `course`.
    pub kind: &'static str,
    /// The rejected input.
    pub input: String,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a new random identifier.
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $kind,
                        input: s.to_owned(),
                    })
            }
        }
    };
}

define_id!(
    /// A learner enrolled in zero or more courses.
    StudentId => "student"
);
define_id!(
    /// A user who owns courses and may award badges manually.
    InstructorId => "instructor"
);
define_id!(
    /// A course authored by an instructor.
    CourseId => "course"
);
define_id!(
    /// A module within a course.
    ModuleId => "module"
);
define_id!(
    /// A lesson within a module.
    LessonId => "lesson"
);
define_id!(
    /// An assignment attached to a course.
    AssignmentId => "assignment"
);
define_id!(
    /// A student's submission for an assignment.
    SubmissionId => "submission"
);
define_id!(
    /// A quiz attached to a course.
    QuizId => "quiz"
);
define_id!(
    /// A single attempt at a quiz.
    AttemptId => "attempt"
);
define_id!(
    /// A question within a quiz.
    QuestionId => "question"
);
define_id!(
    /// A badge catalog entry.
    BadgeId => "badge"
);
define_id!(
    /// A badge award fact.
    AwardId => "award"
);
