//! The badge rule table.
//!
//! Rules are a pure mapping from a trigger to the badges it earns. Ratios are
//! compared in integer arithmetic so `90/100` is always exactly on the
//! threshold.

use crate::domain::ids::{CourseId, ModuleId};

use super::model::{BadgeDefinition, BadgeScope};

/// Something that happened which may earn badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTrigger {
    ModuleCompleted {
        course_id: CourseId,
        module_id: ModuleId,
    },
    CourseCompleted {
        course_id: CourseId,
    },
    AssignmentGraded {
        course_id: CourseId,
        marks: u32,
        max_marks: u32,
    },
    QuizCompleted {
        course_id: CourseId,
        score: u32,
        max_marks: u32,
    },
}

/// A badge a trigger earns, and where to attach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeGrant {
    pub definition: BadgeDefinition,
    pub scope: BadgeScope,
}

impl BadgeGrant {
    fn course(definition: BadgeDefinition, course_id: CourseId) -> Self {
        Self {
            definition,
            scope: BadgeScope::Course { course_id },
        }
    }
}

/// `earned / max >= 0.9`, false when `max` is zero.
fn at_least_ninety_percent(earned: u32, max: u32) -> bool {
    max > 0 && u64::from(earned) * 10 >= u64::from(max) * 9
}

/// `earned / max == 1`, false when `max` is zero.
fn is_perfect(earned: u32, max: u32) -> bool {
    max > 0 && earned == max
}

/// Badges earned by `trigger`, in award order.
///
/// # Examples
/// ```
/// use lms_backend::domain::badges::{rules_for, BadgeDefinition, BadgeTrigger};
/// use lms_backend::domain::CourseId;
///
/// let grants = rules_for(BadgeTrigger::QuizCompleted {
///     course_id: CourseId::random(),
///     score: 9,
///     max_marks: 10,
/// });
/// let names: Vec<_> = grants.iter().map(|g| g.definition.name).collect();
/// assert_eq!(names, ["Quiz Completed", "Quiz Master"]);
/// ```
pub fn rules_for(trigger: BadgeTrigger) -> Vec<BadgeGrant> {
    match trigger {
        BadgeTrigger::ModuleCompleted {
            course_id,
            module_id,
        } => vec![BadgeGrant {
            definition: BadgeDefinition::MODULE_COMPLETION,
            scope: BadgeScope::Module {
                course_id,
                module_id,
            },
        }],
        BadgeTrigger::CourseCompleted { course_id } => {
            vec![BadgeGrant::course(
                BadgeDefinition::COURSE_COMPLETION,
                course_id,
            )]
        }
        BadgeTrigger::AssignmentGraded {
            course_id,
            marks,
            max_marks,
        } => {
            let mut grants = vec![BadgeGrant::course(
                BadgeDefinition::ASSIGNMENT_COMPLETED,
                course_id,
            )];
            if at_least_ninety_percent(marks, max_marks) {
                grants.push(BadgeGrant::course(
                    BadgeDefinition::ASSIGNMENT_ACE,
                    course_id,
                ));
            }
            grants
        }
        BadgeTrigger::QuizCompleted {
            course_id,
            score,
            max_marks,
        } => {
            let mut grants = vec![BadgeGrant::course(
                BadgeDefinition::QUIZ_COMPLETED,
                course_id,
            )];
            if at_least_ninety_percent(score, max_marks) {
                grants.push(BadgeGrant::course(BadgeDefinition::QUIZ_MASTER, course_id));
            }
            if is_perfect(score, max_marks) {
                grants.push(BadgeGrant::course(
                    BadgeDefinition::PERFECT_SCORE,
                    course_id,
                ));
            }
            grants
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for rule thresholds.
    use rstest::rstest;

    use super::*;

    fn names(grants: &[BadgeGrant]) -> Vec<&'static str> {
        grants.iter().map(|grant| grant.definition.name).collect()
    }

    #[rstest]
    #[case(95, 100, vec!["Assignment Completed", "Assignment Ace"])]
    #[case(90, 100, vec!["Assignment Completed", "Assignment Ace"])]
    #[case(89, 100, vec!["Assignment Completed"])]
    #[case(9, 10, vec!["Assignment Completed", "Assignment Ace"])]
    #[case(0, 0, vec!["Assignment Completed"])]
    fn assignment_thresholds(
        #[case] marks: u32,
        #[case] max_marks: u32,
        #[case] expected: Vec<&'static str>,
    ) {
        let grants = rules_for(BadgeTrigger::AssignmentGraded {
            course_id: CourseId::random(),
            marks,
            max_marks,
        });
        assert_eq!(names(&grants), expected);
    }

    #[rstest]
    #[case(100, 100, vec!["Quiz Completed", "Quiz Master", "Perfect Score"])]
    #[case(90, 100, vec!["Quiz Completed", "Quiz Master"])]
    #[case(899, 1000, vec!["Quiz Completed"])]
    #[case(0, 10, vec!["Quiz Completed"])]
    #[case(0, 0, vec!["Quiz Completed"])]
    fn quiz_thresholds(
        #[case] score: u32,
        #[case] max_marks: u32,
        #[case] expected: Vec<&'static str>,
    ) {
        let grants = rules_for(BadgeTrigger::QuizCompleted {
            course_id: CourseId::random(),
            score,
            max_marks,
        });
        assert_eq!(names(&grants), expected);
    }

    #[rstest]
    fn module_completion_is_module_scoped() {
        let course_id = CourseId::random();
        let module_id = ModuleId::random();

        let grants = rules_for(BadgeTrigger::ModuleCompleted {
            course_id,
            module_id,
        });

        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].scope.course_id(), course_id);
        assert_eq!(grants[0].scope.module_id(), Some(module_id));
    }

    #[rstest]
    fn course_completion_is_course_scoped() {
        let course_id = CourseId::random();

        let grants = rules_for(BadgeTrigger::CourseCompleted { course_id });

        assert_eq!(names(&grants), ["Course Completion"]);
        assert_eq!(grants[0].scope, BadgeScope::Course { course_id });
    }

    #[rstest]
    fn large_marks_do_not_overflow() {
        let grants = rules_for(BadgeTrigger::AssignmentGraded {
            course_id: CourseId::random(),
            marks: u32::MAX,
            max_marks: u32::MAX,
        });
        assert_eq!(names(&grants), ["Assignment Completed", "Assignment Ace"]);
    }
}
