//! Badge catalog entries and award facts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{AwardId, BadgeId, CourseId, InstructorId, ModuleId, StudentId};

/// Category of a badge.
///
/// # Example
///
/// ```
/// # use lms_backend::domain::badges::BadgeType;
/// assert_eq!(BadgeType::QuizMaster.as_str(), "quiz_master");
/// assert_eq!("perfect_score".parse::<BadgeType>().ok(), Some(BadgeType::PerfectScore));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeType {
    ModuleComplete,
    CourseComplete,
    QuizMaster,
    AssignmentAce,
    PerfectScore,
}

impl BadgeType {
    /// All badge types.
    pub const ALL: [BadgeType; 5] = [
        BadgeType::ModuleComplete,
        BadgeType::CourseComplete,
        BadgeType::QuizMaster,
        BadgeType::AssignmentAce,
        BadgeType::PerfectScore,
    ];

    /// Database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleComplete => "module_complete",
            Self::CourseComplete => "course_complete",
            Self::QuizMaster => "quiz_master",
            Self::AssignmentAce => "assignment_ace",
            Self::PerfectScore => "perfect_score",
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an invalid badge type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBadgeTypeError {
    /// The invalid input string.
    pub input: String,
}

impl fmt::Display for ParseBadgeTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variants: Vec<_> = BadgeType::ALL.iter().map(|v| v.as_str()).collect();
        write!(
            f,
            "invalid badge type '{}': expected one of {}",
            self.input,
            variants.join(", ")
        )
    }
}

impl std::error::Error for ParseBadgeTypeError {}

impl FromStr for BadgeType {
    type Err = ParseBadgeTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|v| v.as_str() == s)
            .copied()
            .ok_or_else(|| ParseBadgeTypeError {
                input: s.to_owned(),
            })
    }
}

/// The static description of a catalog entry, used to seed it when absent.
///
/// Catalog entries are keyed by `(badge_type, name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDefinition {
    pub badge_type: BadgeType,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

impl BadgeDefinition {
    pub const MODULE_COMPLETION: Self = Self {
        badge_type: BadgeType::ModuleComplete,
        name: "Module Completion",
        description: "Awarded for completing a module",
        icon: "📘",
    };
    pub const COURSE_COMPLETION: Self = Self {
        badge_type: BadgeType::CourseComplete,
        name: "Course Completion",
        description: "Awarded for completing a course",
        icon: "🎓",
    };
    pub const QUIZ_MASTER: Self = Self {
        badge_type: BadgeType::QuizMaster,
        name: "Quiz Master",
        description: "Awarded for scoring well on quizzes",
        icon: "🧠",
    };
    pub const ASSIGNMENT_ACE: Self = Self {
        badge_type: BadgeType::AssignmentAce,
        name: "Assignment Ace",
        description: "Awarded for excellent assignment performance",
        icon: "📝",
    };
    pub const PERFECT_SCORE: Self = Self {
        badge_type: BadgeType::PerfectScore,
        name: "Perfect Score",
        description: "Awarded for achieving a perfect score",
        icon: "💯",
    };
    pub const ASSIGNMENT_COMPLETED: Self = Self {
        badge_type: BadgeType::AssignmentAce,
        name: "Assignment Completed",
        description: "Completed an assignment",
        icon: "✅",
    };
    pub const QUIZ_COMPLETED: Self = Self {
        badge_type: BadgeType::QuizMaster,
        name: "Quiz Completed",
        description: "Completed a quiz",
        icon: "✅",
    };
}

/// Badges bootstrapped by catalog seeding.
pub const CANONICAL_BADGES: [BadgeDefinition; 5] = [
    BadgeDefinition::MODULE_COMPLETION,
    BadgeDefinition::COURSE_COMPLETION,
    BadgeDefinition::QUIZ_MASTER,
    BadgeDefinition::ASSIGNMENT_ACE,
    BadgeDefinition::PERFECT_SCORE,
];

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: BadgeId,
    pub badge_type: BadgeType,
    pub name: String,
    pub description: String,
    pub icon: String,
}

/// What an award is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BadgeScope {
    Course {
        course_id: CourseId,
    },
    Module {
        course_id: CourseId,
        module_id: ModuleId,
    },
}

impl BadgeScope {
    /// The course the award belongs to.
    pub fn course_id(&self) -> CourseId {
        match *self {
            Self::Course { course_id } | Self::Module { course_id, .. } => course_id,
        }
    }

    /// The module the award belongs to, if module scoped.
    pub fn module_id(&self) -> Option<ModuleId> {
        match *self {
            Self::Course { .. } => None,
            Self::Module { module_id, .. } => Some(module_id),
        }
    }
}

/// Who initiated an award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOrigin {
    /// Granted by a rule.
    Automatic,
    /// Granted by hand.
    Instructor {
        instructor_id: InstructorId,
        note: Option<String>,
    },
}

/// An award about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudentBadge {
    pub id: AwardId,
    pub student_id: StudentId,
    pub badge_id: BadgeId,
    pub scope: BadgeScope,
    pub awarded_at: DateTime<Utc>,
    pub origin: AwardOrigin,
}

/// A persisted award. Unique per `(student, badge, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentBadge {
    pub id: AwardId,
    pub student_id: StudentId,
    pub badge_id: BadgeId,
    pub scope: BadgeScope,
    pub awarded_at: DateTime<Utc>,
    pub awarded_by: Option<InstructorId>,
    pub is_instructor_awarded: bool,
    pub note: Option<String>,
}

impl From<NewStudentBadge> for StudentBadge {
    fn from(value: NewStudentBadge) -> Self {
        let NewStudentBadge {
            id,
            student_id,
            badge_id,
            scope,
            awarded_at,
            origin,
        } = value;
        let (awarded_by, note) = match origin {
            AwardOrigin::Automatic => (None, None),
            AwardOrigin::Instructor {
                instructor_id,
                note,
            } => (Some(instructor_id), note),
        };
        Self {
            id,
            student_id,
            badge_id,
            scope,
            awarded_at,
            is_instructor_awarded: awarded_by.is_some(),
            awarded_by,
            note,
        }
    }
}

/// Result of an idempotent award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwardOutcome {
    /// This call created the award.
    Granted(StudentBadge),
    /// The award already existed; the stored row is returned.
    AlreadyHeld(StudentBadge),
}

impl AwardOutcome {
    /// Whether this call created the award.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The stored award either way.
    pub fn award(&self) -> &StudentBadge {
        match self {
            Self::Granted(award) | Self::AlreadyHeld(award) => award,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for badge types, scopes and award construction.
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::test_support::fixture_time;

    #[rstest]
    fn unknown_badge_type_lists_the_valid_ones() {
        let err = "gold_star".parse::<BadgeType>().expect_err("unknown type");

        assert!(err.to_string().contains("module_complete"));
    }

    #[rstest]
    fn scopes_serialise_with_a_kind_tag() {
        let course_id = CourseId::random();
        let module_id = ModuleId::random();

        let course = serde_json::to_value(BadgeScope::Course { course_id }).expect("serialises");
        let module = serde_json::to_value(BadgeScope::Module {
            course_id,
            module_id,
        })
        .expect("serialises");

        assert_eq!(course, json!({ "kind": "course", "course_id": course_id }));
        assert_eq!(module["kind"], "module");
        assert_eq!(
            BadgeScope::Module {
                course_id,
                module_id
            }
            .module_id(),
            Some(module_id)
        );
    }

    #[rstest]
    fn instructor_origin_marks_the_award() {
        let instructor_id = InstructorId::random();
        let award = StudentBadge::from(NewStudentBadge {
            id: AwardId::random(),
            student_id: StudentId::random(),
            badge_id: BadgeId::random(),
            scope: BadgeScope::Course {
                course_id: CourseId::random(),
            },
            awarded_at: fixture_time(),
            origin: AwardOrigin::Instructor {
                instructor_id,
                note: Some("Helped peers".to_owned()),
            },
        });

        assert!(award.is_instructor_awarded);
        assert_eq!(award.awarded_by, Some(instructor_id));
        assert_eq!(award.note.as_deref(), Some("Helped peers"));
    }
}
