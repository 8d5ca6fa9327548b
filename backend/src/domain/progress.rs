//! Per-student completion state: enrollments, lessons and modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CourseId, LessonId, ModuleId, StudentId};
use super::percentage::Percentage;

/// A student's membership of a course and their overall progress in it.
///
/// Unique per `(student_id, course_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub progress: Percentage,
    pub enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    /// A fresh enrollment with no progress.
    pub fn new(student_id: StudentId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            student_id,
            course_id,
            progress: Percentage::ZERO,
            enrolled_at,
        }
    }

    /// Whether the course has been fully completed.
    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }
}

/// Completion state of a single lesson for a student.
///
/// Once completed the row never changes again; repeating the completion
/// keeps the first `completed_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub student_id: StudentId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// A lesson the student has not finished yet.
    pub fn pending(student_id: StudentId, lesson_id: LessonId) -> Self {
        Self {
            student_id,
            lesson_id,
            is_completed: false,
            completed_at: None,
        }
    }

    /// Mark the lesson complete. Returns `true` when this call made the
    /// transition.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(now);
        true
    }
}

/// Derived completion state of a module for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub student_id: StudentId,
    pub module_id: ModuleId,
    pub completion_percentage: Percentage,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ModuleProgress {
    /// A module with nothing completed.
    pub fn pending(student_id: StudentId, module_id: ModuleId) -> Self {
        Self {
            student_id,
            module_id,
            completion_percentage: Percentage::ZERO,
            is_completed: false,
            completed_at: None,
        }
    }

    /// Fold fresh lesson counts into the row.
    ///
    /// With no lessons the prior percentage is kept and the module never
    /// completes. Completion is sticky: once set it is not cleared. Returns
    /// `true` only on the call that flips `is_completed`.
    pub fn apply(&mut self, completed_lessons: u64, total_lessons: u64, now: DateTime<Utc>) -> bool {
        let Some(percentage) = Percentage::from_ratio(completed_lessons, total_lessons) else {
            return false;
        };
        self.completion_percentage = percentage;

        if self.is_completed || completed_lessons < total_lessons {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(now);
        true
    }

    /// Fold another view of the same row into this one without losing
    /// progress.
    ///
    /// The percentage only rises, completion stays set once set and the
    /// first `completed_at` is kept. Returns `true` when `incoming` flipped
    /// this row to completed.
    pub fn merge(&mut self, incoming: &ModuleProgress) -> bool {
        if incoming.completion_percentage > self.completion_percentage {
            self.completion_percentage = incoming.completion_percentage;
        }
        if self.is_completed || !incoming.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = self.completed_at.or(incoming.completed_at);
        true
    }
}

/// Outcome of storing a module progress row.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProgressWrite {
    /// The row as stored after merging.
    pub stored: ModuleProgress,
    /// Whether this write flipped the stored row to completed.
    pub completed_now: bool,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for progress transitions.
    use chrono::TimeZone;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[rstest]
    fn lesson_completion_keeps_first_timestamp(now: DateTime<Utc>) {
        let mut lesson = LessonProgress::pending(StudentId::random(), LessonId::random());

        assert!(lesson.mark_complete(now));
        assert!(!lesson.mark_complete(now + chrono::Duration::hours(1)));
        assert_eq!(lesson.completed_at, Some(now));
    }

    #[rstest]
    fn module_reports_transition_once(now: DateTime<Utc>) {
        let mut module = ModuleProgress::pending(StudentId::random(), ModuleId::random());

        assert!(!module.apply(2, 3, now));
        assert_eq!(module.completion_percentage.value(), 66.67);
        assert!(!module.is_completed);

        assert!(module.apply(3, 3, now));
        assert!(module.is_completed);
        assert_eq!(module.completed_at, Some(now));

        assert!(!module.apply(3, 3, now + chrono::Duration::minutes(5)));
        assert_eq!(module.completed_at, Some(now));
    }

    #[rstest]
    fn empty_module_keeps_prior_percentage(now: DateTime<Utc>) {
        let mut module = ModuleProgress::pending(StudentId::random(), ModuleId::random());
        module.completion_percentage = Percentage::try_new(40.0).expect("in range");

        assert!(!module.apply(0, 0, now));
        assert_eq!(module.completion_percentage.value(), 40.0);
        assert!(!module.is_completed);
    }

    #[rstest]
    fn stale_view_cannot_uncomplete_a_module(now: DateTime<Utc>) {
        let student_id = StudentId::random();
        let module_id = ModuleId::random();
        let mut stored = ModuleProgress::pending(student_id, module_id);
        let mut stale = stored.clone();
        let mut fresh = stored.clone();
        stale.apply(1, 2, now);
        fresh.apply(2, 2, now);

        assert!(stored.merge(&fresh));
        assert!(!stored.merge(&stale));

        assert!(stored.is_completed);
        assert_eq!(stored.completion_percentage, Percentage::FULL);
        assert_eq!(stored.completed_at, Some(now));
    }

    #[rstest]
    fn merge_keeps_first_completion_time(now: DateTime<Utc>) {
        let mut stored = ModuleProgress::pending(StudentId::random(), ModuleId::random());
        let mut first = stored.clone();
        let mut later = stored.clone();
        first.apply(1, 1, now);
        later.apply(1, 1, now + chrono::Duration::minutes(3));

        assert!(stored.merge(&first));
        assert!(!stored.merge(&later));
        assert_eq!(stored.completed_at, Some(now));
    }
}
